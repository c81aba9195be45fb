use super::*;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hubsync_types::models::AggregationLevel;
use hubsync_types::{
    AgentConfig, BundleKind, BundleVersion, Compliance, ManagerBundle, PolicyEvent, StatusObject,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TransportError;
use crate::transport::{BundleProducer, TransportMessage};

/// Collects messages; can be switched to reject sends.
#[derive(Default)]
struct RecordingProducer {
    sent: Mutex<Vec<TransportMessage>>,
    failing: AtomicBool,
}

#[async_trait]
impl BundleProducer for RecordingProducer {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

fn clusters_bundle() -> Arc<AgentBundle<StatusObject>> {
    Arc::new(AgentBundle::with_version(
        "hub1",
        BundleKind::ManagedClusters,
        BundleVersion::new(100, 0),
    ))
}

fn event(name: &str) -> PolicyEvent {
    PolicyEvent {
        event_name: name.to_string(),
        policy_id: "p1".to_string(),
        cluster_id: "c1".to_string(),
        message: String::new(),
        reason: String::new(),
        count: 1,
        compliance: Compliance::Compliant,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

fn decode(message: &TransportMessage) -> ManagerBundle {
    let kind = BundleKind::parse(&message.bundle_type).unwrap();
    (kind.decoder())(&message.payload).unwrap()
}

// ===== AgentBundle =====

#[test]
fn test_upsert_bumps_version_only_on_change() {
    let bundle = clusters_bundle();
    assert!(bundle.upsert(StatusObject::new("a", "cluster-a", "1")));
    assert_eq!(bundle.version(), BundleVersion::new(100, 1));

    assert!(!bundle.upsert(StatusObject::new("a", "cluster-a", "1")));
    assert_eq!(bundle.version(), BundleVersion::new(100, 1));

    assert!(bundle.upsert(StatusObject::new("a", "cluster-a", "2")));
    assert!(!bundle.remove("missing"));
    assert!(bundle.remove("a"));
    assert_eq!(bundle.version(), BundleVersion::new(100, 3));
    assert!(bundle.is_empty());
}

#[test]
fn test_restart_generation_outranks_previous_versions() {
    let bundle = clusters_bundle();
    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));
    let before = bundle.version();

    bundle.restart_generation();
    assert!(bundle.version().newer_than(&before));
    assert_eq!(bundle.version(), BundleVersion::new(101, 0));
}

// ===== Outgoing gate =====

#[test]
fn test_fresh_entry_sends_nothing() {
    let entry = BundleEntry::new("hub1", clusters_bundle(), EligibilityPolicy::Always);
    assert!(entry.try_get_outgoing(&AgentContext::default()).unwrap().is_none());
}

#[test]
fn test_gate_sends_each_version_once() {
    let bundle = clusters_bundle();
    let mut entry = BundleEntry::new("hub1", bundle.clone(), EligibilityPolicy::Always);
    let context = AgentContext::default();

    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));
    let (version, message) = entry.try_get_outgoing(&context).unwrap().unwrap();
    assert_eq!(version, BundleVersion::new(100, 1));
    assert_eq!(message.key, "hub1.ManagedClusters");
    assert_eq!(decode(&message).object_count(), 1);

    // Not confirmed yet: still pending.
    assert!(entry.try_get_outgoing(&context).unwrap().is_some());

    entry.mark_sent(version);
    assert_eq!(entry.last_sent_version(), version);
    assert!(entry.try_get_outgoing(&context).unwrap().is_none());
}

#[test]
fn test_snapshot_is_a_copy() {
    let bundle = clusters_bundle();
    let mut entry = BundleEntry::new("hub1", bundle.clone(), EligibilityPolicy::Always);

    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));
    let (version, _) = entry.try_get_outgoing(&AgentContext::default()).unwrap().unwrap();
    entry.mark_sent(version);

    // Mutating the live bundle must not move the snapshot with it.
    bundle.upsert(StatusObject::new("b", "cluster-b", "1"));
    assert_eq!(entry.last_sent_version(), version);
    assert!(entry.try_get_outgoing(&AgentContext::default()).unwrap().is_some());
}

#[test]
fn test_ineligible_entry_is_not_mutated() {
    let bundle = clusters_bundle();
    let entry = BundleEntry::new("hub1", bundle.clone(), EligibilityPolicy::LocalPoliciesEnabled);
    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));

    let disabled = AgentContext { enable_local_policies: false, ..AgentContext::default() };
    assert!(entry.try_get_outgoing(&disabled).unwrap().is_none());
    assert_eq!(entry.last_sent_version(), BundleVersion::new(100, 0));
    assert!(entry.try_get_outgoing(&AgentContext::default()).unwrap().is_some());
}

#[test]
fn test_eligibility_policies() {
    let minimal =
        AgentContext { aggregation_level: AggregationLevel::Minimal, enable_local_policies: false };
    assert!(EligibilityPolicy::Always.allows(&minimal));
    assert!(!EligibilityPolicy::FullAggregation.allows(&minimal));
    assert!(!EligibilityPolicy::LocalPoliciesEnabled.allows(&minimal));
    assert!(EligibilityPolicy::FullAggregation.allows(&AgentContext::default()));
}

#[test]
fn test_delta_bundle_forgets_sent_events() {
    let events: Arc<AgentBundle<PolicyEvent>> = Arc::new(AgentBundle::with_version(
        "hub1",
        BundleKind::LocalPolicyEvents,
        BundleVersion::new(5, 0),
    ));
    let mut entry = BundleEntry::new("hub1", events.clone(), EligibilityPolicy::Always);

    events.upsert(event("e1"));
    let (version, _) = entry.try_get_outgoing(&AgentContext::default()).unwrap().unwrap();
    events.upsert(event("e2"));
    entry.mark_sent(version);

    // e2 arrived after the encoded snapshot and is kept for the next send.
    assert_eq!(events.objects().len(), 1);
    assert_eq!(events.objects()[0].event_name, "e2");
}

// ===== Status syncer =====

fn syncer(producer: Arc<RecordingProducer>) -> (StatusSyncer, Arc<AgentBundle<StatusObject>>) {
    let config = AgentConfig::new("hub1", "127.0.0.1:9095");
    let mut syncer = StatusSyncer::new(&config, producer);
    let bundle = clusters_bundle();
    syncer.add_bundle(bundle.clone(), EligibilityPolicy::Always);
    (syncer, bundle)
}

#[tokio::test]
async fn test_syncer_marks_sent_only_on_success() {
    let producer = Arc::new(RecordingProducer::default());
    let (mut syncer, bundle) = syncer(producer.clone());
    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));

    producer.failing.store(true, Ordering::SeqCst);
    assert_eq!(syncer.sync_once().await, 0);
    assert_eq!(syncer.entries()[0].last_sent_version(), BundleVersion::new(100, 0));

    producer.failing.store(false, Ordering::SeqCst);
    assert_eq!(syncer.sync_once().await, 1);
    assert_eq!(syncer.entries()[0].last_sent_version(), BundleVersion::new(100, 1));

    assert_eq!(syncer.sync_once().await, 0);
    assert_eq!(producer.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_syncer_heartbeat_every_sweep() {
    let producer = Arc::new(RecordingProducer::default());
    let config = AgentConfig::new("hub1", "127.0.0.1:9095");
    let mut syncer = StatusSyncer::new(&config, producer.clone()).with_heartbeat();

    syncer.sync_once().await;
    syncer.sync_once().await;

    let sent = producer.sent.lock();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.bundle_type == "HubHeartbeat"));
    assert!(decode(&sent[1]).version().newer_than(&decode(&sent[0]).version()));
}

#[tokio::test]
async fn test_syncer_respects_context_switch() {
    let producer = Arc::new(RecordingProducer::default());
    let config = AgentConfig::new("hub1", "127.0.0.1:9095");
    let mut syncer = StatusSyncer::new(&config, producer.clone());
    let spec: Arc<AgentBundle<StatusObject>> =
        Arc::new(AgentBundle::with_version("hub1", BundleKind::LocalPolicySpec, BundleVersion::new(1, 0)));
    syncer.add_bundle(spec.clone(), EligibilityPolicy::LocalPoliciesEnabled);
    spec.upsert(StatusObject::new("policy-1", "p1", "1"));

    syncer.set_context(AgentContext { enable_local_policies: false, ..AgentContext::default() });
    assert_eq!(syncer.sync_once().await, 0);

    syncer.set_context(AgentContext::default());
    assert_eq!(syncer.sync_once().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_syncer_run_stops_on_shutdown() {
    let producer = Arc::new(RecordingProducer::default());
    let (syncer, bundle) = syncer(producer.clone());
    bundle.upsert(StatusObject::new("a", "cluster-a", "1"));

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(syncer.run(rx));

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(producer.sent.lock().len(), 1);
}
