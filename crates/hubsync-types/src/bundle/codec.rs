//! JSON payload codec for transport messages.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{HeartbeatBundle, ManagerBundle, ObjectsBundle, PolicyEvent, StatusObject};
use crate::error::BundleError;

/// Decode factory stored in a bundle registration.
pub type DecodeFn = fn(&[u8]) -> Result<ManagerBundle, BundleError>;

fn decode_json<T: DeserializeOwned>(bundle_type: &str, payload: &[u8]) -> Result<T, BundleError> {
    serde_json::from_slice(payload).map_err(|err| BundleError::Malformed {
        bundle_type: bundle_type.to_string(),
        message: err.to_string(),
    })
}

pub fn decode_managed_clusters(payload: &[u8]) -> Result<ManagerBundle, BundleError> {
    decode_json::<ObjectsBundle<StatusObject>>("ManagedClusters", payload)
        .map(ManagerBundle::ManagedClusters)
}

pub fn decode_local_policy_spec(payload: &[u8]) -> Result<ManagerBundle, BundleError> {
    decode_json::<ObjectsBundle<StatusObject>>("LocalPolicySpec", payload)
        .map(ManagerBundle::LocalPolicySpec)
}

pub fn decode_local_policy_events(payload: &[u8]) -> Result<ManagerBundle, BundleError> {
    decode_json::<ObjectsBundle<PolicyEvent>>("LocalPolicyEvents", payload)
        .map(ManagerBundle::LocalPolicyEvents)
}

pub fn decode_hub_heartbeat(payload: &[u8]) -> Result<ManagerBundle, BundleError> {
    decode_json::<HeartbeatBundle>("HubHeartbeat", payload).map(ManagerBundle::HubHeartbeat)
}

/// Encode any bundle wire shape into a transport payload.
pub fn encode_payload<T: Serialize>(bundle_type: &str, bundle: &T) -> Result<Vec<u8>, BundleError> {
    serde_json::to_vec(bundle).map_err(|err| BundleError::Malformed {
        bundle_type: bundle_type.to_string(),
        message: err.to_string(),
    })
}
