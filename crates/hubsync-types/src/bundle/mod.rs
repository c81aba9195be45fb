//! Bundles: versioned units of state reported by a leaf hub.
//!
//! The set of bundle kinds is closed; `ManagerBundle` is the tagged variant
//! the manager side works with after decoding a transport payload.

mod codec;
mod kind;
mod objects;


pub use codec::{
    decode_hub_heartbeat, decode_local_policy_events, decode_local_policy_spec,
    decode_managed_clusters, encode_payload, DecodeFn,
};
pub use kind::{BundleKind, BundleMode};
pub use objects::{Compliance, PolicyEvent, StatusObject};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::BundleVersion;

/// Wire shape shared by every object-carrying bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectsBundle<T> {
    /// Leaf hub that produced the bundle
    pub source: String,
    pub version: BundleVersion,
    #[serde(default = "Vec::new")]
    pub objects: Vec<T>,
}

impl<T> ObjectsBundle<T> {
    pub fn new(source: impl Into<String>, version: BundleVersion, objects: Vec<T>) -> Self {
        Self { source: source.into(), version, objects }
    }
}

/// Liveness report of a leaf hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatBundle {
    pub source: String,
    pub version: BundleVersion,
    pub reported_at: DateTime<Utc>,
}

/// Decoded bundle as seen by the conflation engine and handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerBundle {
    ManagedClusters(ObjectsBundle<StatusObject>),
    LocalPolicySpec(ObjectsBundle<StatusObject>),
    LocalPolicyEvents(ObjectsBundle<PolicyEvent>),
    HubHeartbeat(HeartbeatBundle),
}

impl ManagerBundle {
    pub fn kind(&self) -> BundleKind {
        match self {
            Self::ManagedClusters(_) => BundleKind::ManagedClusters,
            Self::LocalPolicySpec(_) => BundleKind::LocalPolicySpec,
            Self::LocalPolicyEvents(_) => BundleKind::LocalPolicyEvents,
            Self::HubHeartbeat(_) => BundleKind::HubHeartbeat,
        }
    }

    pub fn bundle_type(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn source(&self) -> &str {
        match self {
            Self::ManagedClusters(b) | Self::LocalPolicySpec(b) => &b.source,
            Self::LocalPolicyEvents(b) => &b.source,
            Self::HubHeartbeat(b) => &b.source,
        }
    }

    pub fn version(&self) -> BundleVersion {
        match self {
            Self::ManagedClusters(b) | Self::LocalPolicySpec(b) => b.version,
            Self::LocalPolicyEvents(b) => b.version,
            Self::HubHeartbeat(b) => b.version,
        }
    }

    /// Number of contained objects (heartbeats carry none).
    pub fn object_count(&self) -> usize {
        match self {
            Self::ManagedClusters(b) | Self::LocalPolicySpec(b) => b.objects.len(),
            Self::LocalPolicyEvents(b) => b.objects.len(),
            Self::HubHeartbeat(_) => 0,
        }
    }

    /// Fold a newer bundle of the same (source, type) into this one.
    ///
    /// Complete-state bundles are replaced wholesale. Delta bundles keep the
    /// buffered change set and append the newer one under the newer version,
    /// since dropping an unapplied delta would lose data.
    pub fn conflate(&mut self, newer: ManagerBundle, mode: BundleMode) {
        match (mode, &mut *self, newer) {
            (
                BundleMode::Delta,
                Self::LocalPolicyEvents(buffered),
                Self::LocalPolicyEvents(incoming),
            ) => {
                buffered.version = incoming.version;
                buffered.objects.extend(incoming.objects);
            },
            (_, slot, newer) => *slot = newer,
        }
    }
}
