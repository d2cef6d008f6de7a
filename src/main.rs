use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayledger::bookings::BookingManager;
use stayledger::config::Config;
use stayledger::engine::AvailabilityEngine;
use stayledger::model::StayWindow;
use stayledger::reconciler;
use stayledger::store::WalStore;

const USAGE: &str = "usage: stayledger [serve | rebuild | availability <from> <to> | stats]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.data_dir.join("stayledger.wal");
    let store = Arc::new(WalStore::open(&wal_path)?);
    let engine = Arc::new(AvailabilityEngine::new(store.clone(), config.capacity));
    let manager = Arc::new(BookingManager::new(engine.clone(), config.policy));

    match args.first().map(String::as_str) {
        None | Some("serve") => serve(config, store, manager).await,
        Some("rebuild") => {
            let report = manager.rebuild_ledger().await?;
            println!(
                "scanned {} bookings: {} dates written, {} unchanged, {} overbooked",
                report.bookings_scanned,
                report.dates_written,
                report.dates_unchanged,
                report.overbooked.len()
            );
            for date in report.overbooked {
                println!("  overbooked: {date}");
            }
            Ok(())
        }
        Some("availability") => {
            let (Some(from), Some(to)) = (args.get(1), args.get(2)) else {
                return Err(USAGE.into());
            };
            let from: NaiveDate = from.parse()?;
            let to: NaiveDate = to.parse()?;
            let window = StayWindow::try_new(from, to).ok_or("<to> must be after <from>")?;
            for day in engine.query_availability(window).await? {
                println!(
                    "{}  rooms {:>3}  halls {}  hall1 {}  hall2 {}",
                    day.date,
                    day.available_rooms,
                    day.available_halls,
                    if day.hall1_free { "free" } else { "taken" },
                    if day.hall2_free { "free" } else { "taken" },
                );
            }
            Ok(())
        }
        Some("stats") => {
            let stats = manager.dashboard_stats(Utc::now().date_naive()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Some(_) => Err(USAGE.into()),
    }
}

async fn serve(
    config: Config,
    store: Arc<WalStore>,
    manager: Arc<BookingManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    stayledger::observability::init(config.metrics_port)?;

    // Start from a ledger that agrees with the booking store.
    let report = manager.rebuild_ledger().await?;
    info!("stayledger ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  capacity: {} rooms, {} halls",
        config.capacity.total_rooms(),
        config.capacity.total_halls()
    );
    info!("  hall billing: {:?}, advance {}%", config.policy.hall_billing, config.policy.advance_percent);
    info!("  bookings: {}, ledger dates repaired: {}", report.bookings_scanned, report.dates_written);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    if let Some(every) = config.reconcile_interval {
        tokio::spawn(reconciler::run_reconciler(manager.clone(), every));
    }
    tokio::spawn(reconciler::run_compactor(store.clone(), config.compact_threshold));

    // Graceful shutdown on SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutdown signal received, compacting log");
    if let Err(e) = store.compact().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("stayledger stopped");
    Ok(())
}
