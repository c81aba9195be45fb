//! Bundle handlers: the only path from the engine into storage.
//!
//! A handler is invoked by one worker at a time per (source, bundle-type)
//! slot and must be idempotent, since the same state may be applied again
//! after a producer restart.

mod complete_state;
mod events;
mod heartbeat;


pub use complete_state::CompleteStateHandler;
pub use events::PolicyEventsHandler;
pub use heartbeat::HeartbeatHandler;

use async_trait::async_trait;
use hubsync_types::{BundleKind, ConfigError, ManagerBundle};
use std::sync::Arc;

use crate::conflation::{priority, BundleRegistry, ConflationRegistration, Priority};
use crate::error::HandlerError;
use crate::storage::{StatusStore, StatusTable};

#[async_trait]
pub trait BundleHandler: Send + Sync {
    /// Apply `bundle` to `store`.
    async fn handle(&self, bundle: &ManagerBundle, store: &dyn StatusStore)
        -> Result<(), HandlerError>;
}

/// Register the built-in bundle kinds with their handlers.
pub fn register_default_handlers(registry: &mut BundleRegistry) -> Result<(), ConfigError> {
    let defaults: [(BundleKind, Priority, Arc<dyn BundleHandler>); 4] = [
        (
            BundleKind::ManagedClusters,
            priority::MANAGED_CLUSTERS,
            Arc::new(CompleteStateHandler::new(StatusTable::ManagedClusters)),
        ),
        (
            BundleKind::LocalPolicySpec,
            priority::LOCAL_POLICY_SPEC,
            Arc::new(CompleteStateHandler::new(StatusTable::LocalPolicySpec)),
        ),
        (BundleKind::LocalPolicyEvents, priority::LOCAL_POLICY_EVENTS, Arc::new(PolicyEventsHandler)),
        (BundleKind::HubHeartbeat, priority::HUB_HEARTBEAT, Arc::new(HeartbeatHandler)),
    ];

    for (kind, priority, handler) in defaults {
        registry.register(ConflationRegistration::new(priority, kind.mode(), kind, handler))?;
    }
    Ok(())
}
