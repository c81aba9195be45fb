use async_trait::async_trait;
use hubsync_types::{BundleKind, ManagerBundle, StatusObject};
use std::collections::BTreeMap;

use super::BundleHandler;
use crate::error::HandlerError;
use crate::storage::{StatusStore, StatusTable, BATCH_SIZE};

/// Syncs a per-source table to the full object set of a complete-state
/// bundle.
///
/// Rows whose resource version is unchanged are not rewritten; rows of the
/// source missing from the bundle are deleted. An id repeated within one
/// bundle is written once, with its last occurrence.
#[derive(Debug, Clone, Copy)]
pub struct CompleteStateHandler {
    table: StatusTable,
}

impl CompleteStateHandler {
    pub fn new(table: StatusTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> StatusTable {
        self.table
    }

    fn expected_kind(&self) -> BundleKind {
        match self.table {
            StatusTable::ManagedClusters => BundleKind::ManagedClusters,
            StatusTable::LocalPolicySpec => BundleKind::LocalPolicySpec,
        }
    }

    fn objects<'a>(&self, bundle: &'a ManagerBundle) -> Result<&'a [StatusObject], HandlerError> {
        match (self.table, bundle) {
            (StatusTable::ManagedClusters, ManagerBundle::ManagedClusters(b))
            | (StatusTable::LocalPolicySpec, ManagerBundle::LocalPolicySpec(b)) => Ok(&b.objects),
            _ => Err(HandlerError::UnexpectedBundle {
                expected: self.expected_kind().as_str(),
                actual: bundle.bundle_type(),
            }),
        }
    }
}

#[async_trait]
impl BundleHandler for CompleteStateHandler {
    async fn handle(
        &self,
        bundle: &ManagerBundle,
        store: &dyn StatusStore,
    ) -> Result<(), HandlerError> {
        let objects = self.objects(bundle)?;
        let source = bundle.source();
        let existing = store.resource_versions(self.table, source).await?;

        let mut latest: BTreeMap<&str, &StatusObject> = BTreeMap::new();
        for object in objects {
            latest.insert(object.id.as_str(), object);
        }

        let changed: Vec<StatusObject> = latest
            .values()
            .filter(|object| existing.get(&object.id) != Some(&object.resource_version))
            .map(|object| (*object).clone())
            .collect();

        let mut removed: Vec<String> =
            existing.into_keys().filter(|id| !latest.contains_key(id.as_str())).collect();
        removed.sort();

        for batch in changed.chunks(BATCH_SIZE) {
            store.upsert_objects(self.table, source, batch).await?;
        }
        for batch in removed.chunks(BATCH_SIZE) {
            store.delete_objects(self.table, source, batch).await?;
        }

        tracing::debug!(
            "[{}] {} v{}: {} upserted, {} deleted, {} unchanged",
            source,
            self.table,
            bundle.version(),
            changed.len(),
            removed.len(),
            latest.len() - changed.len()
        );
        Ok(())
    }
}
