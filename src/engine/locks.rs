use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::model::StayWindow;

/// Per-date write locks behind a rebuild gate.
///
/// Window writers share the gate and take one mutex per date, always in
/// ascending date order, so overlapping windows cannot deadlock. A full
/// rebuild takes the gate exclusively and waits out every window writer.
pub struct DateLocks {
    dates: DashMap<NaiveDate, Arc<Mutex<()>>>,
    gate: Arc<RwLock<()>>,
}

/// Proof that every date of `window` is locked for writing.
pub struct WindowGuard {
    window: StayWindow,
    _dates: Vec<OwnedMutexGuard<()>>,
    _gate: OwnedRwLockReadGuard<()>,
}

impl WindowGuard {
    pub fn window(&self) -> StayWindow {
        self.window
    }

    pub fn covers(&self, window: &StayWindow) -> bool {
        self.window.check_in <= window.check_in && window.check_out <= self.window.check_out
    }
}

impl Default for DateLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl DateLocks {
    pub fn new() -> Self {
        Self {
            dates: DashMap::new(),
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub async fn lock(&self, window: StayWindow) -> WindowGuard {
        let gate = self.gate.clone().read_owned().await;
        let mut guards = Vec::with_capacity(window.nights() as usize);
        for date in window.dates() {
            let mutex = self.dates.entry(date).or_default().clone();
            guards.push(mutex.lock_owned().await);
        }
        WindowGuard {
            window,
            _dates: guards,
            _gate: gate,
        }
    }

    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    /// Drop idle locks for dates before `cutoff`. Returns how many were removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> usize {
        let before = self.dates.len();
        self.dates
            .retain(|date, mutex| *date >= cutoff || Arc::strong_count(mutex) > 1);
        before - self.dates.len()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
