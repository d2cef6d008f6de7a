use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use stayledger::bookings::BookingManager;
use stayledger::config::{BookingPolicy, Capacity};
use stayledger::engine::AvailabilityEngine;
use stayledger::error::Error;
use stayledger::model::*;
use stayledger::store::WalStore;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .and_then(|d| d.checked_add_days(Days::new(offset)))
        .expect("bench dates are in range")
}

fn stay(offset: u64, nights: u64) -> StayWindow {
    StayWindow::new(day(offset), day(offset + nights))
}

fn request(window: StayWindow, rooms: u32) -> BookingRequest {
    BookingRequest {
        guest: Guest {
            guest_name: "Bench Guest".into(),
            mobile: "9800000000".into(),
            address: None,
            special_note: None,
        },
        window,
        number_of_rooms: rooms,
        halls: HallSelection::NONE,
        number_of_guests: rooms,
        extras: Extras::default(),
        prices: Prices {
            price_per_room: 1000,
            ..Prices::default()
        },
    }
}

fn open(dir: &std::path::Path, name: &str) -> Arc<BookingManager> {
    let store = Arc::new(WalStore::open(&dir.join(name)).expect("open WAL"));
    let engine = Arc::new(AvailabilityEngine::new(store, Capacity::default()));
    Arc::new(BookingManager::new(engine, BookingPolicy::default()))
}

async fn phase1_sequential(manager: &BookingManager) {
    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n as u64 {
        let t = Instant::now();
        manager
            .create_booking(request(stay(i, 2), 1))
            .await
            .expect("sequential create");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create latency", &mut latencies);
}

/// Many tasks fight over the same few nights; the ledger must never go past capacity.
async fn phase2_contention(manager: Arc<BookingManager>) {
    let n_tasks = 20;
    let n_per_task = 20;
    let accepted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let manager = manager.clone();
        let accepted = accepted.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                let offset = 2000 + ((t + j) % 5) as u64;
                match manager.create_booking(request(stay(offset, 2), 2)).await {
                    Ok(_) => accepted.fetch_add(1, Ordering::Relaxed),
                    Err(Error::Availability { .. }) => rejected.fetch_add(1, Ordering::Relaxed),
                    Err(e) => panic!("unexpected error: {e}"),
                };
            }
        }));
    }
    for h in handles {
        h.await.expect("contention task");
    }

    let elapsed = start.elapsed();
    println!(
        "  {} attempts in {:.2}s: {} accepted, {} rejected",
        n_tasks * n_per_task,
        elapsed.as_secs_f64(),
        accepted.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed)
    );

    let window = stay(2000, 6);
    for entry in manager.engine().entries_between(window).await.expect("ledger read") {
        assert!(
            entry.booked_rooms <= entry.total_rooms,
            "oversold {}: {} booked",
            entry.date,
            entry.booked_rooms
        );
    }
    println!("  no date oversold");
}

async fn phase3_read_under_load(manager: Arc<BookingManager>) {
    let stop = Arc::new(AtomicBool::new(false));

    let mut writers = Vec::new();
    for w in 0..4u64 {
        let manager = manager.clone();
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let offset = 3000 + w * 400 + (i % 400);
                let _ = manager.create_booking(request(stay(offset, 1), 1)).await;
                i += 1;
            }
        }));
    }

    let n_readers = 8;
    let reads_per_reader = 300;
    let mut readers = Vec::new();
    for r in 0..n_readers {
        let manager = manager.clone();
        readers.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let offset = 3000 + ((r * 97 + i * 13) % 1500) as u64;
                let t = Instant::now();
                manager
                    .engine()
                    .query_availability(stay(offset, 14))
                    .await
                    .expect("availability query");
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in readers {
        all.extend(h.await.expect("reader task"));
    }
    stop.store(true, Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }
    print_latency("availability query (14 nights)", &mut all);
}

async fn phase4_rebuild(manager: &BookingManager) {
    let start = Instant::now();
    let report = manager.rebuild_ledger().await.expect("rebuild");
    println!(
        "  rebuilt {} bookings in {:.2}ms ({} written, {} unchanged)",
        report.bookings_scanned,
        start.elapsed().as_secs_f64() * 1000.0,
        report.dates_written,
        report.dates_unchanged
    );
    let start = Instant::now();
    let again = manager.rebuild_ledger().await.expect("rebuild");
    println!(
        "  second rebuild in {:.2}ms ({} written)",
        start.elapsed().as_secs_f64() * 1000.0,
        again.dates_written
    );
}

#[tokio::main]
async fn main() {
    let dir = tempfile::tempdir().expect("temp dir");

    println!("=== stayledger stress benchmark ===");
    println!("data: {}\n", dir.path().display());

    let manager = open(dir.path(), "bench.wal");

    println!("[phase 1] sequential create throughput");
    phase1_sequential(&manager).await;

    println!("\n[phase 2] contended creates on shared nights");
    phase2_contention(manager.clone()).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(manager.clone()).await;

    println!("\n[phase 4] full ledger rebuild");
    phase4_rebuild(&manager).await;

    println!("\n=== done ===");
}
