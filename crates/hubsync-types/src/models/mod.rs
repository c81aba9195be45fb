//! Shared data models for hubsync.
//!
//! Configuration of both sides of the sync and the statistics snapshot
//! reported by the manager.

pub mod config;
mod stats;

// Re-export all models
pub use config::{AgentConfig, AggregationLevel, ManagerConfig, StorageBackend};
pub use stats::{BundleTypeStats, StageStats, StatisticsSnapshot};
