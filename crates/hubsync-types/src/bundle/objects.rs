//! Objects carried inside bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource reported in a complete-state bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusObject {
    /// Resource identity (uid on the leaf hub)
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Revision marker; unchanged marker means unchanged row
    pub resource_version: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl StatusObject {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        resource_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            namespace: None,
            resource_version: resource_version.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Policy compliance as reported by a leaf hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Compliance {
    Compliant,
    NonCompliant,
    Pending,
    #[default]
    Unknown,
}

impl Compliance {
    /// Value stored in the database compliance column.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }
}

/// A policy status event; delta bundles append these.
///
/// Natural key: (`event_name`, `count`, `created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvent {
    pub event_name: String,
    pub policy_id: String,
    pub cluster_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
    pub count: i64,
    #[serde(default)]
    pub compliance: Compliance,
    pub created_at: DateTime<Utc>,
}

impl PolicyEvent {
    /// Natural key used for conflict-ignore inserts.
    pub fn natural_key(&self) -> (&str, i64, DateTime<Utc>) {
        (self.event_name.as_str(), self.count, self.created_at)
    }
}
