//! Statistics collector.
//!
//! Per bundle-type counters and latency aggregates plus engine-wide gauges.
//! Every hook also feeds the `metrics` facade. Observes only: no hook ever
//! influences a conflation decision.

#![allow(clippy::arithmetic_side_effects, reason = "counter accumulation")]


use hubsync_types::models::{BundleTypeStats, StageStats};
use hubsync_types::StatisticsSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::prometheus;

#[derive(Debug, Default)]
struct BundleMetrics {
    received: u64,
    conflations: u64,
    stale: u64,
    queueing: StageStats,
    processing: StageStats,
}

fn observe(stage: &mut StageStats, duration: Duration, ok: bool) {
    if ok {
        let ms = duration.as_millis() as u64;
        stage.successes += 1;
        stage.total_ms += ms;
        stage.max_ms = stage.max_ms.max(ms);
    } else {
        stage.failures += 1;
    }
}

/// Engine statistics shared by the manager, the worker pool and the timer.
#[derive(Debug)]
pub struct Statistics {
    /// Period of the snapshot log; `None` disables the timer
    interval: Option<Duration>,
    bundle_metrics: HashMap<String, Mutex<BundleMetrics>>,
    conflation_units: AtomicUsize,
    ready_queue_size: AtomicUsize,
    idle_workers: AtomicUsize,
}

impl Statistics {
    /// Collector for the given bundle types. Hooks for other types are
    /// ignored.
    pub fn new<I, S>(bundle_types: I, interval: Option<Duration>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bundle_metrics = bundle_types
            .into_iter()
            .map(|bundle_type| (bundle_type.into(), Mutex::new(BundleMetrics::default())))
            .collect();
        Self {
            interval,
            bundle_metrics,
            conflation_units: AtomicUsize::new(0),
            ready_queue_size: AtomicUsize::new(0),
            idle_workers: AtomicUsize::new(0),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    fn with_metrics(&self, bundle_type: &str, update: impl FnOnce(&mut BundleMetrics)) {
        if let Some(metrics) = self.bundle_metrics.get(bundle_type) {
            update(&mut metrics.lock());
        }
    }

    pub fn increment_received(&self, bundle_type: &str) {
        self.with_metrics(bundle_type, |m| m.received += 1);
        prometheus::record_received(bundle_type);
    }

    pub fn increment_conflations(&self, bundle_type: &str) {
        self.with_metrics(bundle_type, |m| m.conflations += 1);
        prometheus::record_conflation(bundle_type);
    }

    pub fn increment_stale(&self, bundle_type: &str) {
        self.with_metrics(bundle_type, |m| m.stale += 1);
        prometheus::record_stale(bundle_type);
    }

    /// Enqueue to dispatch.
    pub fn record_queueing(&self, bundle_type: &str, duration: Duration) {
        self.with_metrics(bundle_type, |m| observe(&mut m.queueing, duration, true));
        prometheus::record_queueing(bundle_type, duration);
    }

    /// Dispatch to completion.
    pub fn record_processing(&self, bundle_type: &str, duration: Duration, ok: bool) {
        self.with_metrics(bundle_type, |m| observe(&mut m.processing, duration, ok));
        prometheus::record_processing(bundle_type, ok, duration);
    }

    pub fn set_conflation_units(&self, count: usize) {
        self.conflation_units.store(count, Ordering::Relaxed);
        prometheus::update_conflation_units(count);
    }

    pub fn set_ready_queue_size(&self, size: usize) {
        self.ready_queue_size.store(size, Ordering::Relaxed);
        prometheus::update_ready_queue_size(size);
    }

    pub fn set_idle_workers(&self, count: usize) {
        self.idle_workers.store(count, Ordering::Relaxed);
        prometheus::update_idle_workers(count);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let mut bundle_types: Vec<BundleTypeStats> = self
            .bundle_metrics
            .iter()
            .map(|(bundle_type, metrics)| {
                let metrics = metrics.lock();
                BundleTypeStats {
                    bundle_type: bundle_type.clone(),
                    total_received: metrics.received,
                    conflations: metrics.conflations,
                    stale_dropped: metrics.stale,
                    queueing: metrics.queueing.clone(),
                    processing: metrics.processing.clone(),
                }
            })
            .collect();
        bundle_types.sort_by(|a, b| a.bundle_type.cmp(&b.bundle_type));

        StatisticsSnapshot {
            conflation_units: self.conflation_units.load(Ordering::Relaxed),
            ready_queue_size: self.ready_queue_size.load(Ordering::Relaxed),
            idle_workers: self.idle_workers.load(Ordering::Relaxed),
            bundle_types,
        }
    }

    /// Spawn the periodic snapshot log.
    ///
    /// Returns `None` without spawning anything when the interval is disabled.
    pub fn start(self: &Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        let period = self.interval?;
        let statistics = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        statistics.log_snapshot();
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Statistics timer shutting down");
                        break;
                    }
                }
            }
        }))
    }

    fn log_snapshot(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            "Statistics: units={} ready={} idle_workers={} received={} failures={}",
            snapshot.conflation_units,
            snapshot.ready_queue_size,
            snapshot.idle_workers,
            snapshot.total_received(),
            snapshot.total_failures()
        );
        for stats in &snapshot.bundle_types {
            tracing::info!(
                "  {}: received={} conflated={} stale={} queueing avg={}ms max={}ms \
                 processing ok={} failed={} avg={}ms max={}ms",
                stats.bundle_type,
                stats.total_received,
                stats.conflations,
                stats.stale_dropped,
                stats.queueing.avg_ms(),
                stats.queueing.max_ms,
                stats.processing.successes,
                stats.processing.failures,
                stats.processing.avg_ms(),
                stats.processing.max_ms
            );
        }
    }
}
