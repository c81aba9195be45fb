//! Manager (central side) configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::enums::StorageBackend;
use crate::error::ConfigError;

fn default_max_db_connections() -> u32 {
    20
}

fn default_listen_addr() -> String {
    "0.0.0.0:9095".to_string()
}

fn default_worker_pool_size() -> usize {
    10
}

fn default_handler_timeout_secs() -> u64 {
    30
}

fn default_statistics_log_interval() -> String {
    "1m".to_string()
}

/// Full manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Storage backend handlers write to
    #[serde(default)]
    pub storage: StorageBackend,
    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(default)]
    pub database_url: Option<String>,
    /// Connection pool ceiling
    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,
    /// Address the bundle transport listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Number of concurrent dispatcher workers
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Deadline for a single handler invocation, in seconds
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// Statistics log period ("1m", "30s"); zero or negative disables it
    #[serde(default = "default_statistics_log_interval")]
    pub statistics_log_interval: String,
    /// Prometheus exporter address; unset disables the exporter
    #[serde(default)]
    pub metrics_listen_addr: Option<String>,
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self {
            storage: StorageBackend::default(),
            database_url: None,
            max_db_connections: default_max_db_connections(),
            listen_addr: default_listen_addr(),
            worker_pool_size: default_worker_pool_size(),
            handler_timeout_secs: default_handler_timeout_secs(),
            statistics_log_interval: default_statistics_log_interval(),
            metrics_listen_addr: None,
        }
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Parsed statistics period; `None` means the timer is disabled.
    pub fn statistics_interval(&self) -> Result<Option<Duration>, ConfigError> {
        parse_log_interval(&self.statistics_log_interval)
    }

    /// Reject values the engine cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::validation("worker_pool_size", "must be at least 1"));
        }
        if self.handler_timeout_secs == 0 {
            return Err(ConfigError::validation("handler_timeout_secs", "must be at least 1"));
        }
        if self.storage == StorageBackend::Postgres
            && self.database_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::validation(
                "database_url",
                "required when storage is postgres",
            ));
        }
        self.statistics_interval()?;
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a statistics period.
///
/// `"0"`, a zero duration or any negative value disable the timer.
pub fn parse_log_interval(raw: &str) -> Result<Option<Duration>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') || trimmed == "0" {
        return Ok(None);
    }
    let duration = humantime::parse_duration(trimmed).map_err(|err| {
        ConfigError::validation("statistics_log_interval", format!("{trimmed:?}: {err}"))
    })?;
    if duration.is_zero() {
        return Ok(None);
    }
    Ok(Some(duration))
}
