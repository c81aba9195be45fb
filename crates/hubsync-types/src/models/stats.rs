//! Statistics snapshot models.

use serde::{Deserialize, Serialize};

/// Aggregated durations for one measured stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StageStats {
    /// Completed measurements that succeeded
    pub successes: u64,
    /// Completed measurements that failed
    pub failures: u64,
    /// Sum of successful durations in milliseconds
    pub total_ms: u64,
    /// Longest successful duration in milliseconds
    pub max_ms: u64,
}

impl StageStats {
    /// Mean successful duration in milliseconds.
    pub fn avg_ms(&self) -> u64 {
        if self.successes == 0 {
            0
        } else {
            self.total_ms / self.successes
        }
    }
}

/// Per bundle-type counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleTypeStats {
    pub bundle_type: String,
    /// Bundles received from the transport
    pub total_received: u64,
    /// Buffered bundles superseded by a newer one before dispatch
    pub conflations: u64,
    /// Bundles discarded as not newer than the slot
    pub stale_dropped: u64,
    /// Enqueue to dispatch
    pub queueing: StageStats,
    /// Dispatch to completion
    pub processing: StageStats,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatisticsSnapshot {
    /// Number of known sources (conflation units)
    pub conflation_units: usize,
    /// Slots currently waiting for a worker
    pub ready_queue_size: usize,
    /// Workers not executing a handler
    pub idle_workers: usize,
    pub bundle_types: Vec<BundleTypeStats>,
}

impl StatisticsSnapshot {
    pub fn total_received(&self) -> u64 {
        self.bundle_types.iter().map(|stats| stats.total_received).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.bundle_types
            .iter()
            .map(|stats| stats.queueing.failures + stats.processing.failures)
            .sum()
    }

    pub fn for_type(&self, bundle_type: &str) -> Option<&BundleTypeStats> {
        self.bundle_types.iter().find(|stats| stats.bundle_type == bundle_type)
    }
}
