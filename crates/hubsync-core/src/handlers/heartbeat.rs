use async_trait::async_trait;
use hubsync_types::{BundleKind, ManagerBundle};

use super::BundleHandler;
use crate::error::HandlerError;
use crate::storage::StatusStore;

/// Records the last time a leaf hub reported in.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatHandler;

#[async_trait]
impl BundleHandler for HeartbeatHandler {
    async fn handle(
        &self,
        bundle: &ManagerBundle,
        store: &dyn StatusStore,
    ) -> Result<(), HandlerError> {
        let ManagerBundle::HubHeartbeat(heartbeat) = bundle else {
            return Err(HandlerError::UnexpectedBundle {
                expected: BundleKind::HubHeartbeat.as_str(),
                actual: bundle.bundle_type(),
            });
        };
        store.upsert_heartbeat(&heartbeat.source, heartbeat.reported_at).await?;
        Ok(())
    }
}
