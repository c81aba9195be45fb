//! Storage boundary reached only through registered bundle handlers.

mod memory;
mod postgres;


pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubsync_types::{PolicyEvent, StatusObject};
use std::collections::HashMap;
use std::fmt;

/// Maximum rows written by a single statement.
pub const BATCH_SIZE: usize = 100;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Per-source tables written by complete-state handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusTable {
    ManagedClusters,
    LocalPolicySpec,
}

impl StatusTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::ManagedClusters => "status.managed_clusters",
            Self::LocalPolicySpec => "local_spec.policies",
        }
    }
}

impl fmt::Display for StatusTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Resource id -> revision marker of every row the source owns in `table`.
    async fn resource_versions(
        &self,
        table: StatusTable,
        source: &str,
    ) -> StoreResult<HashMap<String, String>>;

    /// Insert or update rows keyed by (source, id).
    async fn upsert_objects(
        &self,
        table: StatusTable,
        source: &str,
        objects: &[StatusObject],
    ) -> StoreResult<()>;

    /// Remove rows of the source by resource id.
    async fn delete_objects(&self, table: StatusTable, source: &str, ids: &[String])
        -> StoreResult<()>;

    /// Insert events, ignoring conflicts on the natural key.
    /// Returns the number of rows actually inserted.
    async fn insert_policy_events(&self, source: &str, events: &[PolicyEvent])
        -> StoreResult<u64>;

    async fn upsert_heartbeat(&self, source: &str, reported_at: DateTime<Utc>) -> StoreResult<()>;
}
