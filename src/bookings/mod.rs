//! Booking lifecycle: create, edit, confirm, complete, cancel and delete,
//! keeping the ledger in step with every change of demand.

mod payments;
mod pricing;
mod stats;
mod validation;

pub use payments::{payment_due_status, DueStatus};
pub use pricing::{charges, compute_financials, Charges};
pub use stats::DashboardStats;
pub use validation::{validate_demand, validate_request, validate_window};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use ulid::Ulid;

use crate::audit::{AuditAction, AuditLog};
use crate::config::BookingPolicy;
use crate::engine::{first_shortfall, AvailabilityEngine, RebuildReport, WindowGuard};
use crate::error::{Error, Result};
use crate::model::*;
use crate::observability;
use crate::store::{DocumentStore, Record, RecordStore};

pub struct BookingManager {
    store: Arc<dyn DocumentStore>,
    engine: Arc<AvailabilityEngine>,
    policy: BookingPolicy,
    audit: AuditLog,
}

impl BookingManager {
    pub fn new(engine: Arc<AvailabilityEngine>, policy: BookingPolicy) -> Self {
        let store = engine.store().clone();
        Self {
            audit: AuditLog::new(store.clone()),
            store,
            engine,
            policy,
        }
    }

    pub fn engine(&self) -> &Arc<AvailabilityEngine> {
        &self.engine
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ── Reads ───────────────────────────────────────────────────

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking> {
        self.store
            .load::<Booking>(&id.to_string())
            .await?
            .ok_or(Error::NotFound(id))
    }

    /// All bookings, oldest first.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.store.load_all::<Booking>().await?)
    }

    /// Active bookings sharing at least one night with `window`.
    pub async fn bookings_overlapping(&self, window: StayWindow) -> Result<Vec<Booking>> {
        self.engine.active_bookings_overlapping(&window, None).await
    }

    // ── Create ──────────────────────────────────────────────────

    /// Validate, check capacity, persist, then reserve, all under one lock
    /// on the stay's dates.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking> {
        let started = Instant::now();
        let result = self.create_inner(request).await;
        observe("create", started, &result);
        result
    }

    async fn create_inner(&self, request: BookingRequest) -> Result<Booking> {
        validate_request(&request, self.engine.capacity())?;
        let financials = compute_financials(&request, &self.policy)?;

        let guard = self.engine.lock_window(request.window).await;
        let days = self.engine.query_availability(request.window).await?;
        if let Some(shortfall) = first_shortfall(&days, request.demand()) {
            return Err(shortfall.into());
        }

        let now = Utc::now();
        let booking = Booking {
            id: Ulid::new(),
            guest: request.guest,
            window: request.window,
            number_of_rooms: request.number_of_rooms,
            halls: request.halls,
            number_of_guests: request.number_of_guests,
            extras: request.extras,
            prices: request.prices,
            financials,
            amount_paid: 0,
            status: if financials.advance_amount > 0 {
                BookingStatus::Confirmed
            } else {
                BookingStatus::Pending
            },
            created_at: now,
            updated_at: now,
        };
        self.store.save(&booking).await?;

        if let Err(e) = self
            .engine
            .reserve_locked(&guard, booking.window, booking.demand())
            .await
        {
            self.undo_create(&guard, &booking).await;
            return Err(e);
        }
        drop(guard);

        info!(
            id = %booking.id,
            window = %booking.window,
            rooms = booking.number_of_rooms,
            halls = booking.halls.count(),
            total = booking.financials.total_amount,
            status = %booking.status,
            "booking created"
        );
        self.audit
            .append(
                AuditAction::BookingCreated,
                Some(booking.id),
                format!(
                    "{} for {} rooms {}",
                    booking.guest.guest_name, booking.number_of_rooms, booking.window
                ),
            )
            .await;
        Ok(booking)
    }

    async fn undo_create(&self, guard: &WindowGuard, booking: &Booking) {
        if let Err(e) = self.store.remove::<Booking>(&booking.key()).await {
            error!(id = %booking.id, error = %e, "could not remove booking after failed reserve");
            metrics::counter!(observability::COMPENSATION_FAILURES_TOTAL).increment(1);
        }
        self.resync_window(guard).await;
    }

    // ── Edit ────────────────────────────────────────────────────

    /// Patch a booking and recompute its financials. A change of dates,
    /// rooms or halls moves the reservation: the new demand is checked
    /// without counting this booking, then the old demand is released and
    /// the new one reserved.
    pub async fn edit_booking(&self, id: Ulid, changes: BookingChanges) -> Result<Booking> {
        let started = Instant::now();
        let result = self.edit_inner(id, changes).await;
        observe("edit", started, &result);
        result
    }

    async fn edit_inner(&self, id: Ulid, changes: BookingChanges) -> Result<Booking> {
        if let Some(window) = &changes.window {
            validate_window(window)?;
        }
        let (guard, current) = self.lock_booking(id, changes.window).await?;
        if current.status.is_terminal() {
            return Err(Error::Validation(format!(
                "booking {id} is {} and can no longer be edited",
                current.status
            )));
        }

        let updated = patched(&current, changes, &self.policy, Utc::now())?;
        validate_request(&updated.as_request(), self.engine.capacity())?;
        if updated.amount_paid > updated.financials.total_amount {
            return Err(Error::Validation(format!(
                "new total {} is below the {} already paid",
                updated.financials.total_amount, updated.amount_paid
            )));
        }

        let moved = updated.window != current.window || updated.demand() != current.demand();
        if moved {
            let days = self
                .engine
                .query_availability_excluding(updated.window, Some(id))
                .await?;
            if let Some(shortfall) = first_shortfall(&days, updated.demand()) {
                return Err(shortfall.into());
            }
        }

        self.store.save(&updated).await?;
        if moved {
            let shifted = async {
                self.engine
                    .release_locked(&guard, current.window, current.demand())
                    .await?;
                self.engine
                    .reserve_locked(&guard, updated.window, updated.demand())
                    .await
            };
            if let Err(e) = shifted.await {
                self.restore(&guard, &current).await;
                return Err(e);
            }
        }
        drop(guard);

        info!(%id, moved, window = %updated.window, total = updated.financials.total_amount, "booking edited");
        let detail = if moved {
            format!("moved from {} to {}", current.window, updated.window)
        } else {
            "details updated".to_string()
        };
        self.audit
            .append(AuditAction::BookingEdited, Some(id), detail)
            .await;
        Ok(updated)
    }

    // ── Status changes ──────────────────────────────────────────

    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking> {
        let started = Instant::now();
        let result = self.set_status(id, BookingStatus::Confirmed).await;
        observe("confirm", started, &result);
        result
    }

    /// Mark a stay as finished. Completed bookings keep their capacity so
    /// the ledger still reflects who occupied each night.
    pub async fn complete_booking(&self, id: Ulid) -> Result<Booking> {
        let started = Instant::now();
        let result = self.set_status(id, BookingStatus::Completed).await;
        observe("complete", started, &result);
        result
    }

    /// Status moves that do not change demand.
    async fn set_status(&self, id: Ulid, to: BookingStatus) -> Result<Booking> {
        let (guard, mut booking) = self.lock_booking(id, None).await?;
        check_transition(&booking, to)?;
        booking.status = to;
        booking.updated_at = Utc::now();
        self.store.save(&booking).await?;
        drop(guard);

        info!(%id, status = %to, "booking status changed");
        let action = match to {
            BookingStatus::Completed => AuditAction::BookingCompleted,
            _ => AuditAction::BookingConfirmed,
        };
        self.audit.append(action, Some(id), to.as_str()).await;
        Ok(booking)
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking> {
        let started = Instant::now();
        let result = self.cancel_inner(id).await;
        observe("cancel", started, &result);
        result
    }

    async fn cancel_inner(&self, id: Ulid) -> Result<Booking> {
        let (guard, current) = self.lock_booking(id, None).await?;
        check_transition(&current, BookingStatus::Cancelled)?;

        let mut cancelled = current.clone();
        cancelled.status = BookingStatus::Cancelled;
        cancelled.updated_at = Utc::now();
        self.store.save(&cancelled).await?;

        if let Err(e) = self
            .engine
            .release_locked(&guard, current.window, current.demand())
            .await
        {
            self.restore(&guard, &current).await;
            return Err(e);
        }
        drop(guard);

        info!(%id, window = %current.window, rooms = current.number_of_rooms, "booking cancelled");
        self.audit
            .append(AuditAction::BookingCancelled, Some(id), format!("released {}", current.window))
            .await;
        Ok(cancelled)
    }

    /// Remove a booking record, releasing its capacity if it still held any.
    /// Its payments stay on file.
    pub async fn delete_booking(&self, id: Ulid) -> Result<Booking> {
        let started = Instant::now();
        let result = self.delete_inner(id).await;
        observe("delete", started, &result);
        result
    }

    async fn delete_inner(&self, id: Ulid) -> Result<Booking> {
        let (guard, booking) = self.lock_booking(id, None).await?;
        self.store.remove::<Booking>(&booking.key()).await?;

        if booking.is_active() {
            if let Err(e) = self
                .engine
                .release_locked(&guard, booking.window, booking.demand())
                .await
            {
                self.restore(&guard, &booking).await;
                return Err(e);
            }
        }
        drop(guard);

        info!(%id, status = %booking.status, "booking deleted");
        self.audit
            .append(
                AuditAction::BookingDeleted,
                Some(id),
                format!("{} {}", booking.guest.guest_name, booking.window),
            )
            .await;
        Ok(booking)
    }

    // ── Ledger repair ───────────────────────────────────────────

    /// Full reconciliation of the ledger against the booking store.
    pub async fn rebuild_ledger(&self) -> Result<RebuildReport> {
        let report = self.engine.rebuild_all().await?;
        self.audit
            .append(
                AuditAction::LedgerRebuilt,
                None,
                format!(
                    "{} bookings, {} dates written, {} overbooked",
                    report.bookings_scanned,
                    report.dates_written,
                    report.overbooked.len()
                ),
            )
            .await;
        Ok(report)
    }

    // ── Helpers ─────────────────────────────────────────────────

    /// Lock the booking's current window (widened to `moving_to` if given)
    /// and read the booking under that lock. Retries if a concurrent edit
    /// moved the booking out of the locked window in between.
    async fn lock_booking(
        &self,
        id: Ulid,
        moving_to: Option<StayWindow>,
    ) -> Result<(WindowGuard, Booking)> {
        loop {
            let seen = self.get_booking(id).await?;
            let span = moving_to.map_or(seen.window, |w| seen.window.union(&w));
            let guard = self.engine.lock_window(span).await;
            let current = self.get_booking(id).await?;
            if guard.covers(&current.window) {
                return Ok((guard, current));
            }
        }
    }

    /// Put back a booking record after a failed ledger update, then
    /// recompute the locked dates from the store.
    async fn restore(&self, guard: &WindowGuard, previous: &Booking) {
        if let Err(e) = self.store.save(previous).await {
            error!(id = %previous.id, error = %e, "could not restore booking after failed ledger update");
            metrics::counter!(observability::COMPENSATION_FAILURES_TOTAL).increment(1);
        }
        self.resync_window(guard).await;
    }

    async fn resync_window(&self, guard: &WindowGuard) {
        if let Err(e) = self
            .engine
            .rebuild_window_locked(guard, guard.window())
            .await
        {
            error!(window = %guard.window(), error = %e, "ledger left out of step; reconciler will repair");
            metrics::counter!(observability::COMPENSATION_FAILURES_TOTAL).increment(1);
        }
    }
}

fn check_transition(booking: &Booking, to: BookingStatus) -> Result<()> {
    if booking.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            id: booking.id,
            from: booking.status,
            to,
        })
    }
}

/// `current` with `changes` applied and financials recomputed.
fn patched(
    current: &Booking,
    changes: BookingChanges,
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> Result<Booking> {
    let mut next = current.clone();
    if let Some(guest) = changes.guest {
        next.guest = guest;
    }
    if let Some(window) = changes.window {
        next.window = window;
    }
    if let Some(rooms) = changes.number_of_rooms {
        next.number_of_rooms = rooms;
    }
    if let Some(halls) = changes.halls {
        next.halls = halls;
    }
    if let Some(guests) = changes.number_of_guests {
        next.number_of_guests = guests;
    }
    if let Some(extras) = changes.extras {
        next.extras = extras;
    }
    if let Some(prices) = changes.prices {
        next.prices = prices;
    }
    next.financials = compute_financials(&next.as_request(), policy)?;
    next.updated_at = now;
    Ok(next)
}

fn observe<T>(op: &'static str, started: Instant, result: &Result<T>) {
    let status = observability::outcome_label(result);
    metrics::counter!(observability::BOOKING_OPS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::BOOKING_OP_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
    if let Err(e) = result {
        tracing::debug!(op, error = %e, "booking operation rejected");
    }
}
