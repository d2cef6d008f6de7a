use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use ulid::Ulid;

use crate::error::Result;
use crate::model::*;

use super::BookingManager;

/// Upcoming check-ins are counted this many days ahead, today included.
const UPCOMING_DAYS: u64 = 7;

/// Admin dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_bookings: usize,
    /// Every payment ever recorded, including those of cancelled bookings.
    pub total_revenue: Amount,
    /// Outstanding balance across active bookings.
    pub pending_payments: Amount,
    pub upcoming_check_ins: usize,
    pub cash_collected: Amount,
    pub gpay_collected: Amount,
    pub online_collected: Amount,
}

impl DashboardStats {
    pub fn compute(bookings: &[Booking], payments: &[Payment], today: NaiveDate) -> Self {
        let horizon = today.checked_add_days(Days::new(UPCOMING_DAYS)).unwrap_or(NaiveDate::MAX);

        let mut paid_by_booking: HashMap<Ulid, Amount> = HashMap::new();
        let mut stats = DashboardStats::default();
        for p in payments {
            *paid_by_booking.entry(p.booking_id).or_default() += p.amount;
            stats.total_revenue += p.amount;
            match p.mode {
                PaymentMode::Cash => stats.cash_collected += p.amount,
                PaymentMode::GPay => stats.gpay_collected += p.amount,
                PaymentMode::Online => stats.online_collected += p.amount,
            }
        }

        for b in bookings.iter().filter(|b| b.is_active()) {
            stats.total_bookings += 1;
            let paid = paid_by_booking.get(&b.id).copied().unwrap_or(0);
            stats.pending_payments += b.financials.total_amount.saturating_sub(paid);
            if (today..=horizon).contains(&b.window.check_in) {
                stats.upcoming_check_ins += 1;
            }
        }
        stats
    }
}

impl BookingManager {
    pub async fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats> {
        let bookings = self.list_bookings().await?;
        let payments = self.list_payments().await?;
        Ok(DashboardStats::compute(&bookings, &payments, today))
    }
}
