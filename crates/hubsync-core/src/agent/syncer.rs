use hubsync_types::AgentConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::bundle::{AgentHeartbeat, OutgoingBundle};
use super::gate::{AgentContext, BundleEntry, EligibilityPolicy};
use crate::transport::BundleProducer;

/// Periodic sweep of all outgoing entries of a leaf hub.
pub struct StatusSyncer {
    source: String,
    context: AgentContext,
    interval: Duration,
    entries: Vec<BundleEntry>,
    heartbeat: Option<Arc<AgentHeartbeat>>,
    producer: Arc<dyn BundleProducer>,
}

impl StatusSyncer {
    pub fn new(config: &AgentConfig, producer: Arc<dyn BundleProducer>) -> Self {
        Self {
            source: config.leaf_hub_name.clone(),
            context: AgentContext::from(config),
            interval: config.sync_interval(),
            entries: Vec::new(),
            heartbeat: None,
            producer,
        }
    }

    pub fn add_bundle(&mut self, bundle: Arc<dyn OutgoingBundle>, policy: EligibilityPolicy) {
        self.entries.push(BundleEntry::new(self.source.clone(), bundle, policy));
    }

    /// Send a heartbeat on every sweep.
    pub fn with_heartbeat(mut self) -> Self {
        let heartbeat = Arc::new(AgentHeartbeat::new(self.source.clone()));
        self.add_bundle(heartbeat.clone(), EligibilityPolicy::Always);
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn set_context(&mut self, context: AgentContext) {
        self.context = context;
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// One sweep. Returns the number of bundles the transport accepted.
    pub async fn sync_once(&mut self) -> usize {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.beat();
        }

        let mut sent = 0;
        for entry in &mut self.entries {
            let (version, message) = match entry.try_get_outgoing(&self.context) {
                Ok(Some(outgoing)) => outgoing,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!("[{}] Failed to encode {}: {}", self.source, entry.bundle_type(), err);
                    continue;
                },
            };

            match self.producer.send(message).await {
                Ok(()) => {
                    entry.mark_sent(version);
                    sent += 1;
                    tracing::debug!("[{}] Sent {} v{}", self.source, entry.bundle_type(), version);
                },
                Err(err) => {
                    // Snapshot unchanged: retried on the next sweep.
                    tracing::warn!(
                        "[{}] Failed to send {} v{}: {}",
                        self.source,
                        entry.bundle_type(),
                        version,
                        err
                    );
                },
            }
        }
        sent
    }

    /// Sweep every interval until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            "Status syncer for {} started ({} bundles, every {:?})",
            self.source,
            self.entries.len(),
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sync_once().await;
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("Status syncer for {} shutting down", self.source);
                    break;
                }
            }
        }
    }
}
