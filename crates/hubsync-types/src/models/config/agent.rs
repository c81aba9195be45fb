//! Agent (leaf hub side) configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::enums::AggregationLevel;

fn default_sync_interval_secs() -> u64 {
    5
}

fn default_enable_local_policies() -> bool {
    true
}

/// Settings of the status sync loop running on a leaf hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identity of this leaf hub (the bundle source id)
    pub leaf_hub_name: String,
    /// Manager transport address
    pub manager_addr: String,
    /// Period between outgoing-bundle sweeps, in seconds
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// How much policy detail leaves the hub
    #[serde(default)]
    pub aggregation_level: AggregationLevel,
    /// Whether locally created policies are reported
    #[serde(default = "default_enable_local_policies")]
    pub enable_local_policies: bool,
}

impl AgentConfig {
    pub fn new(leaf_hub_name: impl Into<String>, manager_addr: impl Into<String>) -> Self {
        Self {
            leaf_hub_name: leaf_hub_name.into(),
            manager_addr: manager_addr.into(),
            sync_interval_secs: default_sync_interval_secs(),
            aggregation_level: AggregationLevel::default(),
            enable_local_policies: default_enable_local_policies(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}
