//! Manager configuration loading: JSON file, then CLI/env overrides.

use hubsync_types::{ConfigError, ManagerConfig};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

const CONFIG_DIR: &str = "hubsync";
const CONFIG_FILE: &str = "manager.json";

/// `<platform config dir>/hubsync/manager.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the manager config.
///
/// An explicit path must exist. Without one, the default location is used
/// if present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<ManagerConfig, ConfigError> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound { path: path.display().to_string() });
            }
            path.to_path_buf()
        },
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(ManagerConfig::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|e| ConfigError::ParseError {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;
    let config: ManagerConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// CLI flags and environment variables win over the file.
pub fn apply_overrides(config: &mut ManagerConfig, cli: &Cli) {
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(addr) = &cli.listen_addr {
        config.listen_addr = addr.clone();
    }
    if let Some(workers) = cli.workers {
        config.worker_pool_size = workers;
    }
    if let Some(timeout) = cli.handler_timeout_secs {
        config.handler_timeout_secs = timeout;
    }
    if let Some(interval) = &cli.statistics_interval {
        config.statistics_log_interval = interval.clone();
    }
    if let Some(addr) = &cli.metrics_addr {
        config.metrics_listen_addr = Some(addr.clone());
    }
}
