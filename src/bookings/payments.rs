use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{error, info};
use ulid::Ulid;

use crate::audit::AuditAction;
use crate::error::{Error, Result};
use crate::model::*;
use crate::observability;
use crate::store::{RangeQuery, Record, RecordStore};

use super::{observe, BookingManager};

/// How pressing a booking's outstanding balance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Paid,
    /// Check-in is today, tomorrow or already past.
    Urgent,
    /// Check-in within three days.
    Warning,
    Pending,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::Paid => "paid",
            DueStatus::Urgent => "urgent",
            DueStatus::Warning => "warning",
            DueStatus::Pending => "pending",
        }
    }
}

pub fn payment_due_status(booking: &Booking, today: NaiveDate) -> DueStatus {
    if booking.balance_due() == 0 {
        return DueStatus::Paid;
    }
    match (booking.window.check_in - today).num_days() {
        ..=1 => DueStatus::Urgent,
        2..=3 => DueStatus::Warning,
        _ => DueStatus::Pending,
    }
}

impl BookingManager {
    /// Record money received against a booking. Payments never touch the
    /// ledger. A pending booking becomes confirmed once its advance is in.
    pub async fn record_payment(&self, booking_id: Ulid, amount: Amount, mode: PaymentMode) -> Result<Payment> {
        let started = Instant::now();
        let result = self.record_payment_inner(booking_id, amount, mode).await;
        observe("record_payment", started, &result);
        result
    }

    async fn record_payment_inner(&self, booking_id: Ulid, amount: Amount, mode: PaymentMode) -> Result<Payment> {
        if amount == 0 {
            return Err(Error::Payment("amount must be positive".into()));
        }
        let (guard, mut booking) = self.lock_booking(booking_id, None).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(Error::Payment(format!("booking {booking_id} is cancelled")));
        }
        let due = booking.balance_due();
        if amount > due {
            return Err(Error::Payment(format!("amount {amount} exceeds balance due {due}")));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Ulid::new(),
            booking_id,
            amount,
            mode,
            kind: if amount == due {
                PaymentKind::Balance
            } else {
                PaymentKind::Advance
            },
            paid_at: now,
        };
        self.store.save(&payment).await?;

        booking.amount_paid += amount;
        if booking.status == BookingStatus::Pending && booking.amount_paid >= booking.financials.advance_amount {
            booking.status = BookingStatus::Confirmed;
        }
        booking.updated_at = now;
        if let Err(e) = self.store.save(&booking).await {
            if let Err(undo) = self.store.remove::<Payment>(&payment.key()).await {
                error!(id = %payment.id, error = %undo, "could not remove payment after failed booking update");
                metrics::counter!(observability::COMPENSATION_FAILURES_TOTAL).increment(1);
            }
            return Err(e.into());
        }
        drop(guard);

        metrics::counter!(observability::PAYMENTS_TOTAL, "mode" => mode.as_str()).increment(1);
        info!(
            id = %payment.id,
            booking = %booking_id,
            amount,
            mode = mode.as_str(),
            balance = booking.balance_due(),
            "payment recorded"
        );
        self.audit
            .append(
                AuditAction::PaymentRecorded,
                Some(booking_id),
                format!("{amount} by {}", mode.as_str()),
            )
            .await;
        Ok(payment)
    }

    /// Payments for one booking, oldest first.
    pub async fn payments_for(&self, booking_id: Ulid) -> Result<Vec<Payment>> {
        let query = RangeQuery::eq("bookingId", booking_id.to_string());
        let mut payments = self.store.query::<Payment>(&query).await?;
        payments.sort_by_key(|p| (p.paid_at, p.id));
        Ok(payments)
    }

    pub async fn list_payments(&self) -> Result<Vec<Payment>> {
        Ok(self.store.load_all::<Payment>().await?)
    }

    pub async fn balance_due(&self, booking_id: Ulid) -> Result<Amount> {
        Ok(self.get_booking(booking_id).await?.balance_due())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn owing(check_in: &str, total: Amount, paid: Amount) -> Booking {
        let mut b = stored_booking(
            StayWindow::new(d(check_in), d(check_in).succ_opt().unwrap()),
            1,
            HallSelection::NONE,
            BookingStatus::Confirmed,
        );
        b.financials.total_amount = total;
        b.amount_paid = paid;
        b
    }

    #[test]
    fn due_status_by_days_to_check_in() {
        let today = d("2025-01-10");
        assert_eq!(payment_due_status(&owing("2025-01-10", 1000, 1000), today), DueStatus::Paid);
        assert_eq!(payment_due_status(&owing("2025-01-08", 1000, 0), today), DueStatus::Urgent);
        assert_eq!(payment_due_status(&owing("2025-01-11", 1000, 0), today), DueStatus::Urgent);
        assert_eq!(payment_due_status(&owing("2025-01-12", 1000, 500), today), DueStatus::Warning);
        assert_eq!(payment_due_status(&owing("2025-01-13", 1000, 0), today), DueStatus::Warning);
        assert_eq!(payment_due_status(&owing("2025-01-14", 1000, 0), today), DueStatus::Pending);
    }
}
