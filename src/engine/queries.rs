use chrono::{NaiveDate, Utc};
use ulid::Ulid;

use crate::error::Result;
use crate::model::*;
use crate::store::{RangeQuery, RecordStore, Subscription};

use super::availability::{accumulate_demand, availability_by_day};
use super::{check_window_width, date_key, AvailabilityEngine};

impl AvailabilityEngine {
    /// Capacity left on each date of `window`, computed from active bookings.
    /// Lock-free; may be stale by the time the caller acts on it.
    pub async fn query_availability(&self, window: StayWindow) -> Result<Vec<DayAvailability>> {
        self.query_availability_excluding(window, None).await
    }

    /// As [`query_availability`](Self::query_availability), ignoring one booking's own demand.
    pub async fn query_availability_excluding(
        &self,
        window: StayWindow,
        exclude: Option<Ulid>,
    ) -> Result<Vec<DayAvailability>> {
        check_window_width(&window)?;
        let bookings = self.active_bookings_overlapping(&window, exclude).await?;
        let demand = accumulate_demand(bookings.iter(), Some(&window));
        Ok(availability_by_day(&window, self.capacity, &demand))
    }

    /// Point lookup. `None` means nothing has been booked on that date yet.
    pub async fn get_entry(&self, date: NaiveDate) -> Result<Option<LedgerEntry>> {
        Ok(self.store.load::<LedgerEntry>(&date_key(date)).await?)
    }

    /// Like [`get_entry`](Self::get_entry), reading absence as full capacity.
    pub async fn entry_or_vacant(&self, date: NaiveDate) -> Result<LedgerEntry> {
        Ok(self
            .get_entry(date)
            .await?
            .unwrap_or_else(|| LedgerEntry::vacant(date, self.capacity, Utc::now())))
    }

    /// Stored ledger entries inside `window`, ascending. Dates with no entry are omitted.
    pub async fn entries_between(&self, window: StayWindow) -> Result<Vec<LedgerEntry>> {
        check_window_width(&window)?;
        Ok(self.store.query::<LedgerEntry>(&ledger_range(&window)).await?)
    }

    /// Live calendar feed: the full set of entries in `window` after every change.
    pub fn subscribe_ledger(&self, window: StayWindow) -> Subscription<LedgerEntry> {
        Subscription::new(self.store.clone(), ledger_range(&window))
    }
}

pub(super) fn ledger_range(window: &StayWindow) -> RangeQuery {
    RangeQuery::half_open("date", date_key(window.check_in), date_key(window.check_out))
}
