//! Live bundles maintained on a leaf hub.

use chrono::Utc;
use hubsync_types::bundle::encode_payload;
use hubsync_types::{
    BundleError, BundleKind, BundleMode, BundleVersion, HeartbeatBundle, ObjectsBundle,
    PolicyEvent, StatusObject,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

/// Encoded snapshot of a bundle, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBundle {
    pub version: BundleVersion,
    pub payload: Vec<u8>,
}

/// A bundle the outgoing gate can read.
pub trait OutgoingBundle: Send + Sync {
    fn kind(&self) -> BundleKind;

    fn version(&self) -> BundleVersion;

    /// Serialize the current state together with the version it reflects.
    fn encode(&self) -> Result<EncodedBundle, BundleError>;

    /// Called after `version` was accepted by the transport.
    fn on_sent(&self, _version: BundleVersion) {}
}

/// Object stored in a keyed agent bundle.
pub trait KeyedObject: Clone + PartialEq + Serialize + Send + Sync {
    fn object_key(&self) -> String;
}

impl KeyedObject for StatusObject {
    fn object_key(&self) -> String {
        self.id.clone()
    }
}

impl KeyedObject for PolicyEvent {
    fn object_key(&self) -> String {
        let (name, count, created_at) = self.natural_key();
        format!("{name}/{count}/{}", created_at.timestamp_millis())
    }
}

#[derive(Debug)]
struct BundleState<T> {
    version: BundleVersion,
    /// Key -> (object, version that last changed it)
    objects: BTreeMap<String, (T, BundleVersion)>,
}

/// Keyed object set with a version bumped on every effective change.
///
/// Complete-state bundles always transmit the full set. Delta bundles forget
/// objects once a version containing them has been sent.
#[derive(Debug)]
pub struct AgentBundle<T> {
    source: String,
    kind: BundleKind,
    state: RwLock<BundleState<T>>,
}

impl<T: KeyedObject> AgentBundle<T> {
    pub fn new(source: impl Into<String>, kind: BundleKind) -> Self {
        Self::with_version(source, kind, BundleVersion::initial())
    }

    pub fn with_version(source: impl Into<String>, kind: BundleKind, version: BundleVersion) -> Self {
        Self {
            source: source.into(),
            kind,
            state: RwLock::new(BundleState { version, objects: BTreeMap::new() }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Insert or replace an object. Returns false (and keeps the version) if
    /// an identical object is already present.
    pub fn upsert(&self, object: T) -> bool {
        let key = object.object_key();
        let mut state = self.state.write();
        if state.objects.get(&key).is_some_and(|(current, _)| *current == object) {
            return false;
        }
        state.version.incr();
        let version = state.version;
        state.objects.insert(key, (object, version));
        true
    }

    /// Remove an object by key. Returns false if it was not present.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state.write();
        if state.objects.remove(key).is_none() {
            return false;
        }
        state.version.incr();
        true
    }

    /// Start a new generation, e.g. after a full resync of the local state.
    pub fn restart_generation(&self) {
        self.state.write().version.next_generation();
    }

    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    pub fn objects(&self) -> Vec<T> {
        self.state.read().objects.values().map(|(object, _)| object.clone()).collect()
    }
}

impl<T: KeyedObject> OutgoingBundle for AgentBundle<T> {
    fn kind(&self) -> BundleKind {
        self.kind
    }

    fn version(&self) -> BundleVersion {
        self.state.read().version
    }

    fn encode(&self) -> Result<EncodedBundle, BundleError> {
        let state = self.state.read();
        let wire = ObjectsBundle::new(
            self.source.clone(),
            state.version,
            state.objects.values().map(|(object, _)| object.clone()).collect(),
        );
        let payload = encode_payload(self.kind.as_str(), &wire)?;
        Ok(EncodedBundle { version: state.version, payload })
    }

    fn on_sent(&self, version: BundleVersion) {
        if self.kind.mode() != BundleMode::Delta {
            return;
        }
        self.state.write().objects.retain(|_, (_, changed_at)| changed_at.newer_than(&version));
    }
}

/// Liveness bundle; `beat` bumps the version so the next sweep sends it.
#[derive(Debug)]
pub struct AgentHeartbeat {
    source: String,
    version: RwLock<BundleVersion>,
}

impl AgentHeartbeat {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), version: RwLock::new(BundleVersion::initial()) }
    }

    pub fn beat(&self) {
        self.version.write().incr();
    }
}

impl OutgoingBundle for AgentHeartbeat {
    fn kind(&self) -> BundleKind {
        BundleKind::HubHeartbeat
    }

    fn version(&self) -> BundleVersion {
        *self.version.read()
    }

    fn encode(&self) -> Result<EncodedBundle, BundleError> {
        let version = self.version();
        let wire = HeartbeatBundle { source: self.source.clone(), version, reported_at: Utc::now() };
        let payload = encode_payload(BundleKind::HubHeartbeat.as_str(), &wire)?;
        Ok(EncodedBundle { version, payload })
    }
}
