use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram, Unit};

use crate::error::Error;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations. Labels: op, status.
pub const BOOKING_OPS_TOTAL: &str = "stayledger_booking_ops_total";

/// Histogram: booking operation latency in seconds. Labels: op.
pub const BOOKING_OP_DURATION_SECONDS: &str = "stayledger_booking_op_duration_seconds";

/// Counter: payments recorded. Labels: mode.
pub const PAYMENTS_TOTAL: &str = "stayledger_payments_total";

// ── Ledger health ───────────────────────────────────────────────

/// Counter: ledger entries written by reserve/release/rebuild. Labels: op.
pub const LEDGER_WRITES_TOTAL: &str = "stayledger_ledger_writes_total";

/// Counter: dates observed with more capacity booked than exists.
pub const OVERBOOKED_DATES_TOTAL: &str = "stayledger_overbooked_dates_total";

/// Counter: compensating writes that failed, leaving drift for the reconciler.
pub const COMPENSATION_FAILURES_TOTAL: &str = "stayledger_compensation_failures_total";

/// Histogram: full ledger rebuild duration in seconds.
pub const REBUILD_DURATION_SECONDS: &str = "stayledger_rebuild_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "stayledger_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "stayledger_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus metrics exporter: {e}"))?;
    describe_metrics();
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// HELP text and units for every metric above.
fn describe_metrics() {
    describe_counter!(BOOKING_OPS_TOTAL, "Booking operations by op and outcome");
    describe_histogram!(
        BOOKING_OP_DURATION_SECONDS,
        Unit::Seconds,
        "Booking operation latency"
    );
    describe_counter!(PAYMENTS_TOTAL, "Payments recorded by mode");
    describe_counter!(LEDGER_WRITES_TOTAL, "Ledger entries written by reserve, release and rebuild");
    describe_counter!(OVERBOOKED_DATES_TOTAL, "Dates seen with more booked than the property holds");
    describe_counter!(
        COMPENSATION_FAILURES_TOTAL,
        "Compensating writes that failed and left drift for the reconciler"
    );
    describe_histogram!(REBUILD_DURATION_SECONDS, Unit::Seconds, "Full ledger rebuild duration");
    describe_histogram!(WAL_FLUSH_DURATION_SECONDS, Unit::Seconds, "WAL group-commit flush duration");
    describe_histogram!(WAL_FLUSH_BATCH_SIZE, Unit::Count, "Events per WAL flush");
}

/// Status label for an operation outcome.
pub fn outcome_label<T>(result: &Result<T, Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn exported_metrics_carry_help_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            metrics::counter!(BOOKING_OPS_TOTAL, "op" => "create", "status" => "ok").increment(1);
            metrics::histogram!(REBUILD_DURATION_SECONDS).record(0.01);
        });

        let text = handle.render();
        assert!(text.contains("# HELP stayledger_booking_ops_total Booking operations"));
        assert!(text.contains("# HELP stayledger_rebuild_duration_seconds Full ledger rebuild"));
    }

    #[test]
    fn outcome_labels_follow_error_kind() {
        assert_eq!(outcome_label(&Ok::<(), Error>(())), "ok");
        assert_eq!(outcome_label::<()>(&Err(Error::LimitExceeded("x"))), "limit_exceeded");
    }
}
