//! Typed error definitions for hubsync.
//!
//! This module provides the errors shared by every crate in the workspace:
//!
//! - **Serializable** for snapshots and logs via serde
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros

mod bundle;
mod config;

pub use bundle::BundleError;
pub use config::ConfigError;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = BundleError::UnknownBundleType { bundle_type: "Placements".to_string() };

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("UnknownBundleType"));
        assert!(json.contains("Placements"));

        let deserialized: BundleError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::DuplicateRegistration { bundle_type: "ManagedClusters".to_string() };

        let msg = format!("{}", err);
        assert!(msg.contains("already registered"));
        assert!(msg.contains("ManagedClusters"));
    }
}
