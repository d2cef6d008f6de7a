//! Availability engine: owns the per-date ledger and derives it from the
//! booking store.

mod availability;
mod locks;
mod mutations;
mod queries;

pub use availability::{
    accumulate_demand, availability_by_day, day_availability, first_shortfall, DayDemand, Shortfall,
};
pub use locks::{DateLocks, WindowGuard};
pub use mutations::RebuildReport;

use std::sync::Arc;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::config::Capacity;
use crate::error::{Error, Result};
use crate::limits::MAX_QUERY_WINDOW_DAYS;
use crate::model::*;
use crate::store::{DocumentStore, RangeQuery, RecordStore};

pub struct AvailabilityEngine {
    store: Arc<dyn DocumentStore>,
    capacity: Capacity,
    locks: DateLocks,
}

impl AvailabilityEngine {
    pub fn new(store: Arc<dyn DocumentStore>, capacity: Capacity) -> Self {
        Self {
            store,
            capacity,
            locks: DateLocks::new(),
        }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Lock every date of `window` for a read-validate-write sequence.
    pub async fn lock_window(&self, window: StayWindow) -> WindowGuard {
        self.locks.lock(window).await
    }

    /// Drop idle per-date locks older than `cutoff`.
    pub fn prune_locks(&self, cutoff: NaiveDate) -> usize {
        self.locks.prune_before(cutoff)
    }

    /// Active bookings whose stay overlaps `window`, optionally ignoring one.
    pub(crate) async fn active_bookings_overlapping(
        &self,
        window: &StayWindow,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>> {
        // The store filters on one field; the other half of the overlap test runs here.
        let query = RangeQuery::below("checkInDate", date_key(window.check_out));
        let bookings = self.store.query::<Booking>(&query).await?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.is_active() && b.window.overlaps(window) && Some(b.id) != exclude)
            .collect())
    }
}

pub(crate) fn check_window_width(window: &StayWindow) -> Result<()> {
    if window.check_out <= window.check_in {
        return Err(Error::Validation(format!(
            "window end {} must be after its start {}",
            window.check_out, window.check_in
        )));
    }
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(Error::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// Ledger document key for a date.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
