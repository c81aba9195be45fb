use super::*;
use crate::error::ConfigError;
use std::time::Duration;

#[test]
fn test_defaults_from_empty_json() {
    let config: ManagerConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, ManagerConfig::default());
    assert_eq!(config.worker_pool_size, 10);
    assert_eq!(config.statistics_log_interval, "1m");
    assert_eq!(config.storage, StorageBackend::Postgres);
}

#[test]
fn test_interval_parsing() {
    assert_eq!(parse_log_interval("30s").unwrap(), Some(Duration::from_secs(30)));
    assert_eq!(parse_log_interval("1m").unwrap(), Some(Duration::from_secs(60)));
    assert_eq!(parse_log_interval("0").unwrap(), None);
    assert_eq!(parse_log_interval("0s").unwrap(), None);
    assert_eq!(parse_log_interval("-5s").unwrap(), None);
    assert!(parse_log_interval("soon").is_err());
}

#[test]
fn test_validate_rejects_zero_workers() {
    let config = ManagerConfig {
        storage: StorageBackend::Memory,
        worker_pool_size: 0,
        ..ManagerConfig::default()
    };
    match config.validate() {
        Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "worker_pool_size"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_validate_requires_database_url_for_postgres() {
    let config = ManagerConfig::default();
    assert!(config.validate().is_err());

    let config = ManagerConfig {
        database_url: Some("postgres://hubsync@localhost/hubsync".to_string()),
        ..ManagerConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_interval() {
    let config = ManagerConfig {
        storage: StorageBackend::Memory,
        statistics_log_interval: "every now and then".to_string(),
        ..ManagerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_storage_backend_from_str() {
    assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
    assert_eq!("PostgreSQL".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
    assert!("sqlite".parse::<StorageBackend>().is_err());
}

#[test]
fn test_agent_config_defaults() {
    let config: AgentConfig =
        serde_json::from_str(r#"{"leaf_hub_name": "hub1", "manager_addr": "manager:9095"}"#)
            .unwrap();
    assert_eq!(config.sync_interval(), Duration::from_secs(5));
    assert_eq!(config.aggregation_level, AggregationLevel::Full);
    assert!(config.enable_local_policies);
}
