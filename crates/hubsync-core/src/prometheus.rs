//! Prometheus metrics for hubsync observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `hubsync_bundles_received_total{bundle_type}` - Counter of decoded bundles
//! - `hubsync_bundles_conflated_total{bundle_type}` - Counter of buffered bundles superseded
//! - `hubsync_bundles_stale_total{bundle_type}` - Counter of stale or duplicate drops
//! - `hubsync_decode_errors_total` - Counter of dropped malformed/unregistered messages
//! - `hubsync_queueing_duration_seconds{bundle_type}` - Histogram of enqueue to dispatch
//! - `hubsync_processing_duration_seconds{bundle_type,status}` - Histogram of handler calls
//! - `hubsync_conflation_units` - Gauge of known sources
//! - `hubsync_ready_queue_size` - Gauge of slots waiting for a worker
//! - `hubsync_idle_workers` - Gauge of workers not running a handler

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static EXPORTER_INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Histogram buckets for storage writes.
///
/// Most batches land in a few milliseconds; a complete-state resync of a
/// large hub or a congested database pushes into seconds.
const STORAGE_LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms - heartbeat upsert
    0.005, // 5ms
    0.025, // 25ms - single batch
    0.1,   // 100ms
    0.5,   // 500ms - multi-batch resync
    1.0,   // 1s
    5.0,   // 5s - congested database
    30.0,  // 30s - default handler deadline
];

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must run inside a tokio runtime. Subsequent calls are no-ops.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if EXPORTER_INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(STORAGE_LATENCY_BUCKETS)?
        .install()?;
    let _ = EXPORTER_INSTALLED.set(addr);

    describe_counter!("hubsync_bundles_received_total", "Total bundles decoded and routed");
    describe_counter!(
        "hubsync_bundles_conflated_total",
        "Total buffered bundles superseded by a newer version before dispatch"
    );
    describe_counter!(
        "hubsync_bundles_stale_total",
        "Total bundles dropped because they were not newer than the slot"
    );
    describe_counter!("hubsync_decode_errors_total", "Total transport messages dropped at decode");
    describe_histogram!(
        "hubsync_queueing_duration_seconds",
        "Time a bundle spent pending before a worker picked it"
    );
    describe_histogram!("hubsync_processing_duration_seconds", "Handler invocation duration");
    describe_gauge!("hubsync_conflation_units", "Number of sources with a conflation unit");
    describe_gauge!("hubsync_ready_queue_size", "Slots waiting for a worker");
    describe_gauge!("hubsync_idle_workers", "Workers not executing a handler");

    tracing::info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

pub fn record_received(bundle_type: &str) {
    let labels = [("bundle_type", bundle_type.to_string())];
    counter!("hubsync_bundles_received_total", &labels).increment(1);
}

pub fn record_conflation(bundle_type: &str) {
    let labels = [("bundle_type", bundle_type.to_string())];
    counter!("hubsync_bundles_conflated_total", &labels).increment(1);
}

pub fn record_stale(bundle_type: &str) {
    let labels = [("bundle_type", bundle_type.to_string())];
    counter!("hubsync_bundles_stale_total", &labels).increment(1);
}

pub fn record_decode_error() {
    counter!("hubsync_decode_errors_total").increment(1);
}

pub fn record_queueing(bundle_type: &str, duration: Duration) {
    let labels = [("bundle_type", bundle_type.to_string())];
    histogram!("hubsync_queueing_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a finished handler call.
///
/// # Arguments
/// * `bundle_type` - Registered bundle type of the slot
/// * `ok` - Whether the handler succeeded
/// * `duration` - Dispatch to completion
pub fn record_processing(bundle_type: &str, ok: bool, duration: Duration) {
    let labels = [
        ("bundle_type", bundle_type.to_string()),
        ("status", outcome_label(ok).to_string()),
    ];
    histogram!("hubsync_processing_duration_seconds", &labels).record(duration.as_secs_f64());
}

pub fn update_conflation_units(count: usize) {
    gauge!("hubsync_conflation_units").set(count as f64);
}

pub fn update_ready_queue_size(size: usize) {
    gauge!("hubsync_ready_queue_size").set(size as f64);
}

pub fn update_idle_workers(count: usize) {
    gauge!("hubsync_idle_workers").set(count as f64);
}

/// Label value for a handler outcome.
pub fn outcome_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}
