//! # hubsync Types
//!
//! Core types, models, and error definitions shared by the hubsync workspace.
//!
//! - **`version`** - Totally ordered bundle versions
//! - **`bundle`** - Bundle kinds, payload objects and the JSON codec
//! - **`error`** - Decode and configuration errors
//! - **`models`** - Manager/agent configuration and statistics snapshots
//!
//! ## Architecture Role
//!
//! `hubsync-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        hubsync-types (this crate)
//!                │
//!                ▼
//!          hubsync-core
//!                │
//!                ▼
//!         hubsync-server
//! ```

pub mod bundle;
pub mod error;
pub mod models;
pub mod version;

// Re-export error types for convenience
pub use error::{BundleError, ConfigError};

pub use bundle::{
    BundleKind, BundleMode, Compliance, HeartbeatBundle, ManagerBundle, ObjectsBundle,
    PolicyEvent, StatusObject,
};
pub use models::{AgentConfig, ManagerConfig, StatisticsSnapshot, StorageBackend};
pub use version::BundleVersion;
