//! Static table of bundle registrations.
//!
//! Built once at startup, then frozen inside the conflation manager.

use hubsync_types::bundle::DecodeFn;
use hubsync_types::{BundleError, BundleKind, BundleMode, ConfigError, ManagerBundle};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handlers::BundleHandler;

/// Scheduling preference. Lower values are dispatched first.
pub type Priority = u8;

/// Built-in priorities, highest precedence first.
pub mod priority {
    use super::Priority;

    pub const MANAGED_CLUSTERS: Priority = 0;
    pub const LOCAL_POLICY_SPEC: Priority = 1;
    pub const LOCAL_POLICY_EVENTS: Priority = 2;
    pub const HUB_HEARTBEAT: Priority = 3;
}

/// Immutable registration of one bundle type.
pub struct ConflationRegistration {
    priority: Priority,
    mode: BundleMode,
    bundle_type: String,
    decode: DecodeFn,
    handler: Arc<dyn BundleHandler>,
}

impl ConflationRegistration {
    pub fn new(
        priority: Priority,
        mode: BundleMode,
        kind: BundleKind,
        handler: Arc<dyn BundleHandler>,
    ) -> Self {
        Self {
            priority,
            mode,
            bundle_type: kind.as_str().to_string(),
            decode: kind.decoder(),
            handler,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn mode(&self) -> BundleMode {
        self.mode
    }

    pub fn bundle_type(&self) -> &str {
        &self.bundle_type
    }

    pub fn handler(&self) -> &Arc<dyn BundleHandler> {
        &self.handler
    }

    pub fn decode(&self, payload: &[u8]) -> Result<ManagerBundle, BundleError> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for ConflationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflationRegistration")
            .field("priority", &self.priority)
            .field("mode", &self.mode)
            .field("bundle_type", &self.bundle_type)
            .finish_non_exhaustive()
    }
}

/// Bundle-type id -> registration.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    registrations: HashMap<String, Arc<ConflationRegistration>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration. Registering the same bundle type twice is a
    /// configuration error.
    pub fn register(&mut self, registration: ConflationRegistration) -> Result<(), ConfigError> {
        let bundle_type = registration.bundle_type().to_string();
        if self.registrations.contains_key(&bundle_type) {
            return Err(ConfigError::DuplicateRegistration { bundle_type });
        }
        tracing::debug!(
            "Registered bundle type {} (priority {}, {})",
            bundle_type,
            registration.priority(),
            registration.mode()
        );
        self.registrations.insert(bundle_type, Arc::new(registration));
        Ok(())
    }

    pub fn lookup(&self, bundle_type: &str) -> Option<&Arc<ConflationRegistration>> {
        self.registrations.get(bundle_type)
    }

    /// Registrations ordered by priority, then bundle type.
    pub fn registrations(&self) -> Vec<Arc<ConflationRegistration>> {
        let mut all: Vec<_> = self.registrations.values().cloned().collect();
        all.sort_by(|a, b| {
            a.priority().cmp(&b.priority()).then_with(|| a.bundle_type().cmp(b.bundle_type()))
        });
        all
    }

    pub fn bundle_types(&self) -> Vec<String> {
        self.registrations().iter().map(|r| r.bundle_type().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
