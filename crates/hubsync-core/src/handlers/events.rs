use async_trait::async_trait;
use hubsync_types::{BundleKind, ManagerBundle};

use super::BundleHandler;
use crate::error::HandlerError;
use crate::storage::{StatusStore, BATCH_SIZE};

/// Appends local policy events. Rows already present (same event name,
/// count and creation time) are left untouched; nothing is ever deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEventsHandler;

#[async_trait]
impl BundleHandler for PolicyEventsHandler {
    async fn handle(
        &self,
        bundle: &ManagerBundle,
        store: &dyn StatusStore,
    ) -> Result<(), HandlerError> {
        let ManagerBundle::LocalPolicyEvents(events) = bundle else {
            return Err(HandlerError::UnexpectedBundle {
                expected: BundleKind::LocalPolicyEvents.as_str(),
                actual: bundle.bundle_type(),
            });
        };

        let mut inserted = 0;
        for batch in events.objects.chunks(BATCH_SIZE) {
            inserted += store.insert_policy_events(&events.source, batch).await?;
        }

        tracing::debug!(
            "[{}] LocalPolicyEvents v{}: {} of {} events inserted",
            events.source,
            events.version,
            inserted,
            events.objects.len()
        );
        Ok(())
    }
}
