//! Manager and agent configuration models.

mod agent;
mod enums;
mod manager;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

pub use agent::AgentConfig;
pub use enums::{AggregationLevel, StorageBackend};
pub use manager::{parse_log_interval, ManagerConfig};
