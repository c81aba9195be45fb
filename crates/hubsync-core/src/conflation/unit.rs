//! Per-source conflation unit.
//!
//! One slot per registered bundle type. A slot buffers at most one pending
//! bundle, plus at most one bundle waiting behind the in-flight handler call.

use hubsync_types::{BundleError, BundleMode, BundleVersion, ManagerBundle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::ready_queue::SlotKey;
use super::registry::{BundleRegistry, ConflationRegistration};

/// Result of offering a bundle to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Slot went from empty to pending; it must be indexed as ready.
    Queued,
    /// Replaced (or merged into) a bundle that was already buffered.
    Conflated,
    /// Buffered behind the in-flight bundle.
    Waiting,
    /// Not newer than what the slot has already seen; discarded.
    Stale,
}

/// Observable slot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Pending,
    InFlight,
}

/// Bundle handed to a worker by `select`.
#[derive(Debug)]
pub struct ReadyBundle {
    pub key: SlotKey,
    pub bundle: ManagerBundle,
    pub registration: Arc<ConflationRegistration>,
    /// When the slot first became pending with this buffer.
    pub enqueued_at: Instant,
}

#[derive(Debug)]
struct Buffered {
    bundle: ManagerBundle,
    enqueued_at: Instant,
}

impl Buffered {
    fn new(bundle: ManagerBundle) -> Self {
        Self { bundle, enqueued_at: Instant::now() }
    }

    fn absorb(&mut self, newer: ManagerBundle, mode: BundleMode) {
        self.bundle.conflate(newer, mode);
    }
}

#[derive(Debug)]
enum SlotState {
    Empty,
    Pending(Buffered),
    InFlight { version: BundleVersion, waiting: Option<Buffered> },
}

#[derive(Debug)]
struct Slot {
    registration: Arc<ConflationRegistration>,
    state: SlotState,
    /// Newest version buffered, in flight or applied.
    high_water: Option<BundleVersion>,
    last_applied: Option<BundleVersion>,
}

impl Slot {
    fn new(registration: Arc<ConflationRegistration>) -> Self {
        Self { registration, state: SlotState::Empty, high_water: None, last_applied: None }
    }

    fn is_stale(&self, version: BundleVersion) -> bool {
        self.high_water.is_some_and(|seen| !version.newer_than(&seen))
    }

    fn insert(&mut self, bundle: ManagerBundle) -> InsertOutcome {
        let version = bundle.version();
        if self.is_stale(version) {
            return InsertOutcome::Stale;
        }
        self.high_water = Some(version);

        let mode = self.registration.mode();
        match &mut self.state {
            SlotState::Empty => {
                self.state = SlotState::Pending(Buffered::new(bundle));
                InsertOutcome::Queued
            },
            SlotState::Pending(buffered) => {
                buffered.absorb(bundle, mode);
                InsertOutcome::Conflated
            },
            SlotState::InFlight { waiting: Some(buffered), .. } => {
                buffered.absorb(bundle, mode);
                InsertOutcome::Conflated
            },
            SlotState::InFlight { waiting, .. } => {
                *waiting = Some(Buffered::new(bundle));
                InsertOutcome::Waiting
            },
        }
    }

    fn select(&mut self) -> Option<Buffered> {
        match std::mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::Pending(buffered) => {
                self.state =
                    SlotState::InFlight { version: buffered.bundle.version(), waiting: None };
                Some(buffered)
            },
            other => {
                self.state = other;
                None
            },
        }
    }

    /// Returns true if a waiting bundle became pending.
    ///
    /// A failed version gives up its claim on the high-water mark, so a
    /// redelivered copy of it is accepted again.
    fn complete(&mut self, ok: bool) -> bool {
        match std::mem::replace(&mut self.state, SlotState::Empty) {
            SlotState::InFlight { version, waiting } => {
                if ok {
                    self.last_applied = Some(version);
                } else {
                    let waiting_version = waiting.as_ref().map(|buffered| buffered.bundle.version());
                    self.high_water = self.last_applied.max(waiting_version);
                }
                match waiting {
                    Some(buffered) => {
                        self.state = SlotState::Pending(buffered);
                        true
                    },
                    None => false,
                }
            },
            other => {
                self.state = other;
                false
            },
        }
    }

    fn status(&self) -> SlotStatus {
        match self.state {
            SlotState::Empty => SlotStatus::Empty,
            SlotState::Pending(_) => SlotStatus::Pending,
            SlotState::InFlight { .. } => SlotStatus::InFlight,
        }
    }
}

/// All slots of one source, behind a single lock.
#[derive(Debug)]
pub struct ConflationUnit {
    source: String,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ConflationUnit {
    pub fn new(source: impl Into<String>, registry: &BundleRegistry) -> Self {
        let slots = registry
            .registrations()
            .into_iter()
            .map(|registration| (registration.bundle_type().to_string(), Slot::new(registration)))
            .collect();
        Self { source: source.into(), slots: Mutex::new(slots) }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Offer a decoded bundle to its slot.
    pub fn insert(&self, bundle: ManagerBundle) -> Result<InsertOutcome, BundleError> {
        if bundle.source() != self.source {
            return Err(BundleError::SourceMismatch {
                expected: self.source.clone(),
                actual: bundle.source().to_string(),
            });
        }

        let bundle_type = bundle.bundle_type();
        let version = bundle.version();
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(bundle_type)
            .ok_or_else(|| BundleError::UnknownBundleType { bundle_type: bundle_type.to_string() })?;

        let outcome = slot.insert(bundle);
        tracing::debug!(
            "[{}] {} v{} -> {:?} (slot {:?})",
            self.source,
            bundle_type,
            version,
            outcome,
            slot.status()
        );
        Ok(outcome)
    }

    /// Take the pending bundle of `bundle_type`, moving the slot in flight.
    pub fn select(&self, bundle_type: &str) -> Option<ReadyBundle> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(bundle_type)?;
        let buffered = slot.select()?;
        Some(ReadyBundle {
            key: SlotKey::new(self.source.clone(), bundle_type),
            bundle: buffered.bundle,
            registration: Arc::clone(&slot.registration),
            enqueued_at: buffered.enqueued_at,
        })
    }

    /// Release the in-flight bundle of `bundle_type`.
    ///
    /// Returns true when a waiting bundle became pending and must be
    /// re-indexed as ready.
    pub fn complete(&self, bundle_type: &str, ok: bool) -> bool {
        let mut slots = self.slots.lock();
        slots.get_mut(bundle_type).is_some_and(|slot| slot.complete(ok))
    }

    pub fn slot_status(&self, bundle_type: &str) -> Option<SlotStatus> {
        self.slots.lock().get(bundle_type).map(Slot::status)
    }

    /// Last version whose handler call succeeded.
    pub fn last_applied_version(&self, bundle_type: &str) -> Option<BundleVersion> {
        self.slots.lock().get(bundle_type).and_then(|slot| slot.last_applied)
    }
}
