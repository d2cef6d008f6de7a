use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use tracing::{info, warn};

use crate::bookings::BookingManager;
use crate::store::WalStore;

/// Per-date locks further in the past than this are dropped each pass.
const LOCK_RETENTION_DAYS: u64 = 30;

/// Background task that periodically rebuilds the ledger from the booking
/// store, repairing drift left by failed compensations.
pub async fn run_reconciler(manager: Arc<BookingManager>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick fires immediately; startup already rebuilt.
    interval.tick().await;
    loop {
        interval.tick().await;
        reconcile_once(&manager).await;
    }
}

pub async fn reconcile_once(manager: &BookingManager) {
    match manager.rebuild_ledger().await {
        Ok(report) if report.dates_written > 0 => {
            info!(written = report.dates_written, "reconciler repaired ledger drift")
        }
        Ok(report) => tracing::debug!(unchanged = report.dates_unchanged, "ledger in step"),
        Err(e) => warn!(error = %e, "reconciler pass failed"),
    }
    if let Some(cutoff) = Utc::now().date_naive().checked_sub_days(Days::new(LOCK_RETENTION_DAYS)) {
        let pruned = manager.engine().prune_locks(cutoff);
        if pruned > 0 {
            tracing::debug!(pruned, "dropped idle date locks");
        }
    }
}

/// Background task that rewrites the log once enough appends pile up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let appends = store.appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => info!(appends, "WAL compacted"),
            Err(e) => warn!(error = %e, "WAL compaction failed"),
        }
    }
}
