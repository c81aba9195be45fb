//! In-process implementation of the storage boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubsync_types::{PolicyEvent, StatusObject};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{StatusStore, StatusTable, StoreError, StoreResult};

type EventKey = (String, i64, DateTime<Utc>);

#[derive(Default)]
struct Tables {
    objects: HashMap<(StatusTable, String), BTreeMap<String, StatusObject>>,
    events: Vec<(String, PolicyEvent)>,
    event_keys: HashSet<EventKey>,
    heartbeats: HashMap<String, DateTime<Utc>>,
}

/// Memory-backed store.
///
/// Used by tests and by the manager's memory storage mode. Sources can be
/// marked failing to simulate an unavailable database for that source only.
/// Like a single `INSERT .. ON CONFLICT DO UPDATE`, an upsert batch may not
/// carry the same id twice.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_sources: Mutex<HashSet<String>>,
    upserted_rows: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write for `source` fail until `heal_source`.
    pub fn fail_source(&self, source: &str) {
        self.failing_sources.lock().insert(source.to_string());
    }

    pub fn heal_source(&self, source: &str) {
        self.failing_sources.lock().remove(source);
    }

    /// Rows of `source` in `table`, ordered by id.
    pub fn objects(&self, table: StatusTable, source: &str) -> Vec<StatusObject> {
        self.tables
            .lock()
            .objects
            .get(&(table, source.to_string()))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Events recorded for `source`, in insertion order.
    pub fn events(&self, source: &str) -> Vec<PolicyEvent> {
        self.tables
            .lock()
            .events
            .iter()
            .filter(|(owner, _)| owner == source)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn heartbeat(&self, source: &str) -> Option<DateTime<Utc>> {
        self.tables.lock().heartbeats.get(source).copied()
    }

    /// Total rows written by `upsert_objects` since creation.
    pub fn upserted_rows(&self) -> u64 {
        self.upserted_rows.load(Ordering::SeqCst)
    }

    fn check_available(&self, source: &str) -> StoreResult<()> {
        if self.failing_sources.lock().contains(source) {
            return Err(StoreError::Unavailable(format!("writes for {source} are failing")));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn resource_versions(
        &self,
        table: StatusTable,
        source: &str,
    ) -> StoreResult<HashMap<String, String>> {
        self.check_available(source)?;
        let tables = self.tables.lock();
        Ok(tables
            .objects
            .get(&(table, source.to_string()))
            .map(|rows| {
                rows.iter()
                    .map(|(id, object)| (id.clone(), object.resource_version.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_objects(
        &self,
        table: StatusTable,
        source: &str,
        objects: &[StatusObject],
    ) -> StoreResult<()> {
        self.check_available(source)?;
        let mut batch_ids = HashSet::new();
        for object in objects {
            if !batch_ids.insert(object.id.as_str()) {
                return Err(StoreError::Database(format!(
                    "upsert into {table} touches id {} twice in one statement",
                    object.id
                )));
            }
        }

        let mut tables = self.tables.lock();
        let rows = tables.objects.entry((table, source.to_string())).or_default();
        for object in objects {
            rows.insert(object.id.clone(), object.clone());
        }
        self.upserted_rows.fetch_add(objects.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_objects(
        &self,
        table: StatusTable,
        source: &str,
        ids: &[String],
    ) -> StoreResult<()> {
        self.check_available(source)?;
        let mut tables = self.tables.lock();
        if let Some(rows) = tables.objects.get_mut(&(table, source.to_string())) {
            for id in ids {
                rows.remove(id);
            }
        }
        Ok(())
    }

    async fn insert_policy_events(
        &self,
        source: &str,
        events: &[PolicyEvent],
    ) -> StoreResult<u64> {
        self.check_available(source)?;
        let mut tables = self.tables.lock();
        let mut inserted = 0;
        for event in events {
            let key = (event.event_name.clone(), event.count, event.created_at);
            if tables.event_keys.insert(key) {
                tables.events.push((source.to_string(), event.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn upsert_heartbeat(&self, source: &str, reported_at: DateTime<Utc>) -> StoreResult<()> {
        self.check_available(source)?;
        self.tables.lock().heartbeats.insert(source.to_string(), reported_at);
        Ok(())
    }
}
