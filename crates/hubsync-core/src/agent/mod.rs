//! Leaf hub side: live bundles, the outgoing gate and the sync loop.

mod bundle;
mod gate;
mod syncer;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

pub use bundle::{AgentBundle, AgentHeartbeat, EncodedBundle, KeyedObject, OutgoingBundle};
pub use gate::{AgentContext, BundleEntry, EligibilityPolicy};
pub use syncer::StatusSyncer;
