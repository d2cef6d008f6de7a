use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{NaiveDate, Utc};

use crate::error::Result;
use crate::model::*;
use crate::observability;
use crate::store::RecordStore;

use super::availability::{accumulate_demand, DayDemand};
use super::locks::WindowGuard;
use super::queries::ledger_range;
use super::{date_key, AvailabilityEngine};

/// Outcome of a full or windowed ledger rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub bookings_scanned: usize,
    pub dates_written: usize,
    pub dates_unchanged: usize,
    /// Dates where active bookings claim more than exists.
    pub overbooked: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Reserve,
    Release,
}

impl Delta {
    fn label(self) -> &'static str {
        match self {
            Delta::Reserve => "reserve",
            Delta::Release => "release",
        }
    }
}

impl AvailabilityEngine {
    /// Add `demand` to every date of `window`, creating entries as needed.
    /// Overbooking floors available counts at zero; it is not an error.
    pub async fn reserve(&self, window: StayWindow, demand: Demand) -> Result<()> {
        let guard = self.lock_window(window).await;
        self.reserve_locked(&guard, window, demand).await
    }

    /// [`reserve`](Self::reserve) for a caller already holding the window lock.
    pub async fn reserve_locked(&self, guard: &WindowGuard, window: StayWindow, demand: Demand) -> Result<()> {
        debug_assert!(guard.covers(&window), "{window} not covered by {}", guard.window());
        self.apply_delta(window, demand, Delta::Reserve).await
    }

    /// Inverse of [`reserve`](Self::reserve). Dates with no entry stay absent.
    pub async fn release(&self, window: StayWindow, demand: Demand) -> Result<()> {
        let guard = self.lock_window(window).await;
        self.release_locked(&guard, window, demand).await
    }

    pub async fn release_locked(&self, guard: &WindowGuard, window: StayWindow, demand: Demand) -> Result<()> {
        debug_assert!(guard.covers(&window), "{window} not covered by {}", guard.window());
        self.apply_delta(window, demand, Delta::Release).await
    }

    async fn apply_delta(&self, window: StayWindow, demand: Demand, delta: Delta) -> Result<()> {
        let now = Utc::now();
        let mut existing: BTreeMap<NaiveDate, LedgerEntry> = self
            .store
            .query::<LedgerEntry>(&ledger_range(&window))
            .await?
            .into_iter()
            .map(|e| (e.date, e))
            .collect();

        let mut written: Vec<(NaiveDate, Option<LedgerEntry>)> = Vec::new();
        for date in window.dates() {
            let prior = existing.remove(&date);
            let mut entry = match (&prior, delta) {
                (Some(entry), _) => entry.clone(),
                (None, Delta::Reserve) => LedgerEntry::vacant(date, self.capacity, now),
                (None, Delta::Release) => continue,
            };
            entry.set_capacity(self.capacity);
            match delta {
                Delta::Reserve => entry.reserve(demand.rooms, demand.hall_count(), now),
                Delta::Release => entry.release(demand.rooms, demand.hall_count(), now),
            }
            if entry.booked_rooms > entry.total_rooms || entry.booked_halls > entry.total_halls {
                tracing::warn!(
                    %date,
                    booked_rooms = entry.booked_rooms,
                    booked_halls = entry.booked_halls,
                    "ledger overbooked"
                );
                metrics::counter!(observability::OVERBOOKED_DATES_TOTAL).increment(1);
            }

            if let Err(e) = self.store.save(&entry).await {
                tracing::error!(%date, op = delta.label(), error = %e, "ledger write failed; rolling back");
                self.roll_back(written).await;
                return Err(e.into());
            }
            metrics::counter!(observability::LEDGER_WRITES_TOTAL, "op" => delta.label()).increment(1);
            written.push((date, prior));
        }

        tracing::debug!(
            %window,
            op = delta.label(),
            rooms = demand.rooms,
            halls = demand.hall_count(),
            dates = written.len(),
            "ledger updated"
        );
        Ok(())
    }

    /// Put back the entries an interrupted delta already wrote, newest first.
    async fn roll_back(&self, written: Vec<(NaiveDate, Option<LedgerEntry>)>) {
        for (date, prior) in written.into_iter().rev() {
            let result = match prior {
                Some(entry) => self.store.save(&entry).await,
                None => self.store.remove::<LedgerEntry>(&date_key(date)).await.map(|_| ()),
            };
            if let Err(e) = result {
                tracing::error!(%date, error = %e, "ledger rollback failed");
                metrics::counter!(observability::COMPENSATION_FAILURES_TOTAL).increment(1);
            }
        }
    }

    /// Recompute the whole ledger from active bookings.
    ///
    /// Writes every date with demand and resets every other stored entry to
    /// full capacity. Entries whose counts already match are left untouched,
    /// so a second run changes nothing. Waits for in-flight window writers
    /// and blocks new ones until done.
    pub async fn rebuild_all(&self) -> Result<RebuildReport> {
        let started = Instant::now();
        let _gate = self.locks.exclusive().await;

        let bookings = self.store.load_all::<Booking>().await?;
        let existing = self.store.load_all::<LedgerEntry>().await?;
        let demand = accumulate_demand(bookings.iter(), None);
        let report = self.write_recomputed(&demand, existing, bookings.len()).await?;

        metrics::histogram!(observability::REBUILD_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        tracing::info!(
            bookings = report.bookings_scanned,
            written = report.dates_written,
            unchanged = report.dates_unchanged,
            overbooked = report.overbooked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ledger rebuilt"
        );
        Ok(report)
    }

    /// Recompute the dates of `window` only.
    pub async fn rebuild_window(&self, window: StayWindow) -> Result<RebuildReport> {
        let guard = self.lock_window(window).await;
        self.rebuild_window_locked(&guard, window).await
    }

    pub async fn rebuild_window_locked(&self, guard: &WindowGuard, window: StayWindow) -> Result<RebuildReport> {
        debug_assert!(guard.covers(&window), "{window} not covered by {}", guard.window());
        let bookings = self.active_bookings_overlapping(&window, None).await?;
        let existing = self.store.query::<LedgerEntry>(&ledger_range(&window)).await?;
        let demand = accumulate_demand(bookings.iter(), Some(&window));
        let report = self.write_recomputed(&demand, existing, bookings.len()).await?;
        tracing::debug!(%window, written = report.dates_written, "ledger window rebuilt");
        Ok(report)
    }

    async fn write_recomputed(
        &self,
        demand: &BTreeMap<NaiveDate, DayDemand>,
        existing: Vec<LedgerEntry>,
        bookings_scanned: usize,
    ) -> Result<RebuildReport> {
        let now = Utc::now();
        let mut existing: BTreeMap<NaiveDate, LedgerEntry> = existing.into_iter().map(|e| (e.date, e)).collect();
        let dates: BTreeSet<NaiveDate> = demand.keys().chain(existing.keys()).copied().collect();

        let mut report = RebuildReport {
            bookings_scanned,
            ..RebuildReport::default()
        };
        for date in dates {
            let day = demand.get(&date).copied().unwrap_or_default();
            let fresh = LedgerEntry::from_booked(date, self.capacity, day.rooms, day.halls(), now);

            if fresh.booked_rooms > fresh.total_rooms || day.hall1 > 1 || day.hall2 > 1 || day.halls() > fresh.total_halls {
                tracing::warn!(%date, rooms = day.rooms, hall1 = day.hall1, hall2 = day.hall2, "overbooked date");
                metrics::counter!(observability::OVERBOOKED_DATES_TOTAL).increment(1);
                report.overbooked.push(date);
            }

            if existing.remove(&date).is_some_and(|old| old.same_counts(&fresh)) {
                report.dates_unchanged += 1;
                continue;
            }
            self.store.save(&fresh).await?;
            metrics::counter!(observability::LEDGER_WRITES_TOTAL, "op" => "rebuild").increment(1);
            report.dates_written += 1;
        }
        Ok(report)
    }
}
