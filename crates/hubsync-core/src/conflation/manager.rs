use dashmap::DashMap;
use hubsync_types::{BundleError, ManagerBundle};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

use super::ready_queue::{ReadyQueue, SlotKey};
use super::registry::BundleRegistry;
use super::unit::{ConflationUnit, InsertOutcome, ReadyBundle};
use crate::statistics::Statistics;

/// Owns one conflation unit per source and the cross-source ready index.
///
/// Lock order: a unit lock is never held while taking the ready-index lock.
pub struct ConflationManager {
    registry: Arc<BundleRegistry>,
    units: DashMap<String, Arc<ConflationUnit>>,
    ready: Mutex<ReadyQueue>,
    ready_notify: Notify,
    statistics: Arc<Statistics>,
}

impl ConflationManager {
    pub fn new(registry: BundleRegistry, statistics: Arc<Statistics>) -> Self {
        Self {
            registry: Arc::new(registry),
            units: DashMap::new(),
            ready: Mutex::new(ReadyQueue::default()),
            ready_notify: Notify::new(),
            statistics,
        }
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }

    /// Decode a transport payload and insert it into the unit of `source_id`.
    pub fn route(
        &self,
        source_id: &str,
        bundle_type: &str,
        payload: &[u8],
    ) -> Result<InsertOutcome, BundleError> {
        let registration = self
            .registry
            .lookup(bundle_type)
            .ok_or_else(|| BundleError::UnknownBundleType { bundle_type: bundle_type.to_string() })?;
        let bundle = registration.decode(payload)?;

        if bundle.source() != source_id {
            return Err(BundleError::SourceMismatch {
                expected: source_id.to_string(),
                actual: bundle.source().to_string(),
            });
        }
        self.insert(bundle)
    }

    /// Insert an already decoded bundle into the unit of its source.
    pub fn insert(&self, bundle: ManagerBundle) -> Result<InsertOutcome, BundleError> {
        let bundle_type = bundle.bundle_type();
        let unit = self.get_or_create_unit(bundle.source());
        let outcome = unit.insert(bundle)?;

        self.statistics.increment_received(bundle_type);
        match outcome {
            InsertOutcome::Queued => {
                let key = SlotKey::new(unit.source(), bundle_type);
                self.push_ready(key);
            },
            InsertOutcome::Conflated => self.statistics.increment_conflations(bundle_type),
            InsertOutcome::Stale => self.statistics.increment_stale(bundle_type),
            InsertOutcome::Waiting => {},
        }
        Ok(outcome)
    }

    /// Pop the most urgent pending slot; ties in arrival order.
    pub fn next_ready(&self) -> Option<SlotKey> {
        let (key, remaining) = {
            let mut ready = self.ready.lock();
            let key = ready.pop();
            (key, ready.len())
        };
        self.statistics.set_ready_queue_size(remaining);
        // Chain the wakeup so a burst of pushes reaches more than one worker.
        if key.is_some() && remaining > 0 {
            self.ready_notify.notify_one();
        }
        key
    }

    /// Move the slot in flight and hand over its bundle.
    pub fn select(&self, key: &SlotKey) -> Option<ReadyBundle> {
        self.unit(&key.source)?.select(&key.bundle_type)
    }

    /// Release an in-flight slot, re-indexing it if a bundle was waiting.
    pub fn complete(&self, key: &SlotKey, ok: bool) {
        let Some(unit) = self.unit(&key.source) else {
            return;
        };
        if unit.complete(&key.bundle_type, ok) {
            self.push_ready(key.clone());
        }
    }

    /// Suspend until a slot may have become pending.
    pub async fn wait_ready(&self) {
        self.ready_notify.notified().await;
    }

    pub fn unit(&self, source_id: &str) -> Option<Arc<ConflationUnit>> {
        self.units.get(source_id).map(|unit| Arc::clone(unit.value()))
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().len()
    }

    fn get_or_create_unit(&self, source_id: &str) -> Arc<ConflationUnit> {
        if let Some(unit) = self.units.get(source_id) {
            return Arc::clone(unit.value());
        }

        let unit = Arc::clone(
            self.units
                .entry(source_id.to_string())
                .or_insert_with(|| {
                    tracing::info!("New leaf hub source: {}", source_id);
                    Arc::new(ConflationUnit::new(source_id, &self.registry))
                })
                .value(),
        );
        self.statistics.set_conflation_units(self.units.len());
        unit
    }

    fn push_ready(&self, key: SlotKey) {
        let Some(registration) = self.registry.lookup(&key.bundle_type) else {
            return;
        };
        let priority = registration.priority();
        let size = {
            let mut ready = self.ready.lock();
            ready.push(priority, key);
            ready.len()
        };
        self.statistics.set_ready_queue_size(size);
        self.ready_notify.notify_one();
    }
}
