//! Bundle decode errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning a transport message into a typed bundle.
///
/// Every variant means "drop the message": the producer's redelivery or its
/// next legitimate update will arrive eventually.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum BundleError {
    /// Payload did not parse as the registered bundle shape
    #[error("Malformed {bundle_type} payload: {message}")]
    Malformed {
        /// Bundle-type identifier of the message
        bundle_type: String,
        /// Parser error description
        message: String,
    },

    /// No registration exists for the bundle-type identifier
    #[error("Unregistered bundle type: {bundle_type}")]
    UnknownBundleType {
        /// Identifier that failed the registry lookup
        bundle_type: String,
    },

    /// Bundle claims a different leaf hub than the one it was routed for
    #[error("Bundle routed for source {expected} but produced by {actual}")]
    SourceMismatch {
        /// Source id from the transport message
        expected: String,
        /// Source id embedded in the payload
        actual: String,
    },
}
