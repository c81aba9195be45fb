use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use super::registry::Priority;

/// Identity of a conflation slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub source: String,
    pub bundle_type: String,
}

impl SlotKey {
    pub fn new(source: impl Into<String>, bundle_type: impl Into<String>) -> Self {
        Self { source: source.into(), bundle_type: bundle_type.into() }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.bundle_type)
    }
}

/// Slots that hold a pending bundle and are not in flight, grouped by
/// priority. FIFO within a priority level; each key appears at most once.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    levels: BTreeMap<Priority, VecDeque<SlotKey>>,
    members: HashSet<SlotKey>,
}

impl ReadyQueue {
    /// Returns false if the key was already queued.
    pub(crate) fn push(&mut self, priority: Priority, key: SlotKey) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.levels.entry(priority).or_default().push_back(key);
        true
    }

    /// Oldest key of the most urgent non-empty level.
    pub(crate) fn pop(&mut self) -> Option<SlotKey> {
        let mut level = self.levels.first_entry()?;
        let key = level.get_mut().pop_front();
        if level.get().is_empty() {
            level.remove();
        }
        if let Some(key) = &key {
            self.members.remove(key);
        }
        key
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }
}
