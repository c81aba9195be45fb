use serde::{Deserialize, Serialize};
use std::fmt;

use super::codec::{self, DecodeFn};

/// Completeness semantics of a bundle payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleMode {
    /// Payload is the full current set; absence implies deletion
    CompleteState,
    /// Payload is an insert-only change set
    Delta,
}

impl fmt::Display for BundleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleMode::CompleteState => write!(f, "complete-state"),
            BundleMode::Delta => write!(f, "delta"),
        }
    }
}

/// Closed set of bundle kinds exchanged between leaf hubs and the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BundleKind {
    ManagedClusters,
    LocalPolicySpec,
    LocalPolicyEvents,
    HubHeartbeat,
}

impl BundleKind {
    pub const ALL: [BundleKind; 4] = [
        BundleKind::ManagedClusters,
        BundleKind::LocalPolicySpec,
        BundleKind::LocalPolicyEvents,
        BundleKind::HubHeartbeat,
    ];

    /// Bundle-type identifier used on the transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagedClusters => "ManagedClusters",
            Self::LocalPolicySpec => "LocalPolicySpec",
            Self::LocalPolicyEvents => "LocalPolicyEvents",
            Self::HubHeartbeat => "HubHeartbeat",
        }
    }

    pub fn parse(bundle_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == bundle_type)
    }

    /// Completeness mode the kind is produced with.
    pub fn mode(&self) -> BundleMode {
        match self {
            Self::LocalPolicyEvents => BundleMode::Delta,
            Self::ManagedClusters | Self::LocalPolicySpec | Self::HubHeartbeat => {
                BundleMode::CompleteState
            },
        }
    }

    /// Decode factory for this kind.
    pub fn decoder(&self) -> DecodeFn {
        match self {
            Self::ManagedClusters => codec::decode_managed_clusters,
            Self::LocalPolicySpec => codec::decode_local_policy_spec,
            Self::LocalPolicyEvents => codec::decode_local_policy_events,
            Self::HubHeartbeat => codec::decode_hub_heartbeat,
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
