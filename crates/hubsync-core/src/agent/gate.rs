//! Outgoing bundle gate: decides whether and what a leaf hub transmits.

use hubsync_types::models::AggregationLevel;
use hubsync_types::{AgentConfig, BundleError, BundleVersion};
use std::fmt;
use std::sync::Arc;

use super::bundle::OutgoingBundle;
use crate::transport::TransportMessage;

/// Agent settings the eligibility policies are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentContext {
    pub aggregation_level: AggregationLevel,
    pub enable_local_policies: bool,
}

impl From<&AgentConfig> for AgentContext {
    fn from(config: &AgentConfig) -> Self {
        Self {
            aggregation_level: config.aggregation_level,
            enable_local_policies: config.enable_local_policies,
        }
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self { aggregation_level: AggregationLevel::Full, enable_local_policies: true }
    }
}

/// When a bundle type may leave the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityPolicy {
    Always,
    /// Only while local policy reporting is enabled
    LocalPoliciesEnabled,
    /// Only with full aggregation
    FullAggregation,
}

impl EligibilityPolicy {
    pub fn allows(&self, context: &AgentContext) -> bool {
        match self {
            Self::Always => true,
            Self::LocalPoliciesEnabled => context.enable_local_policies,
            Self::FullAggregation => context.aggregation_level == AggregationLevel::Full,
        }
    }
}

/// Version-gated transmission state of one bundle type.
pub struct BundleEntry {
    source: String,
    bundle: Arc<dyn OutgoingBundle>,
    policy: EligibilityPolicy,
    /// Copy of the last version the transport accepted
    last_sent: BundleVersion,
}

impl BundleEntry {
    /// The snapshot starts at the bundle's current version, so an untouched
    /// bundle is not transmitted.
    pub fn new(
        source: impl Into<String>,
        bundle: Arc<dyn OutgoingBundle>,
        policy: EligibilityPolicy,
    ) -> Self {
        let last_sent = bundle.version();
        Self { source: source.into(), bundle, policy, last_sent }
    }

    pub fn bundle_type(&self) -> &'static str {
        self.bundle.kind().as_str()
    }

    pub fn last_sent_version(&self) -> BundleVersion {
        self.last_sent
    }

    /// Message to transmit, if the policy allows it and the bundle changed
    /// since the last send. Never mutates the entry.
    pub fn try_get_outgoing(
        &self,
        context: &AgentContext,
    ) -> Result<Option<(BundleVersion, TransportMessage)>, BundleError> {
        if !self.policy.allows(context) || !self.bundle.version().newer_than(&self.last_sent) {
            return Ok(None);
        }

        let encoded = self.bundle.encode()?;
        if !encoded.version.newer_than(&self.last_sent) {
            return Ok(None);
        }
        let message = TransportMessage::new(self.source.clone(), self.bundle_type(), encoded.payload);
        Ok(Some((encoded.version, message)))
    }

    /// Record that `version` was accepted by the transport.
    pub fn mark_sent(&mut self, version: BundleVersion) {
        if version.newer_than(&self.last_sent) {
            self.last_sent = version;
        }
        self.bundle.on_sent(version);
    }
}

impl fmt::Debug for BundleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleEntry")
            .field("source", &self.source)
            .field("bundle_type", &self.bundle_type())
            .field("policy", &self.policy)
            .field("last_sent", &self.last_sent)
            .finish()
    }
}
