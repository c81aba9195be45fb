#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test, panics are the assertion mechanism")]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hubsync_core::agent::{AgentBundle, EligibilityPolicy, StatusSyncer};
use hubsync_core::conflation::{priority, BundleRegistry, SlotStatus};
use hubsync_core::handlers::HeartbeatHandler;
use hubsync_core::storage::StatusTable;
use hubsync_core::transport::{BundleProducer, ChannelTransport, TransportMessage};
use hubsync_core::{
    BundleHandler, ConflationRegistration, EngineError, HandlerError, MemoryStore, StatusStore,
    SyncEngine,
};
use hubsync_types::bundle::encode_payload;
use hubsync_types::{
    AgentConfig, BundleKind, BundleMode, BundleVersion, Compliance, ConfigError, HeartbeatBundle,
    ManagerBundle, ManagerConfig, ObjectsBundle, PolicyEvent, StatusObject, StorageBackend,
};
use std::sync::Arc;
use std::time::Duration;

fn manager_config() -> ManagerConfig {
    ManagerConfig {
        storage: StorageBackend::Memory,
        worker_pool_size: 4,
        statistics_log_interval: "0".to_string(),
        ..ManagerConfig::default()
    }
}

fn clusters_message(source: &str, value: u64, ids: &[&str]) -> TransportMessage {
    let objects = ids.iter().map(|id| StatusObject::new(*id, *id, value.to_string())).collect();
    let bundle = ObjectsBundle::new(source, BundleVersion::new(1, value), objects);
    let payload = encode_payload("ManagedClusters", &bundle).expect("encode");
    TransportMessage::new(source, "ManagedClusters", payload)
}

fn event(name: &str) -> PolicyEvent {
    PolicyEvent {
        event_name: name.to_string(),
        policy_id: "policy-1".to_string(),
        cluster_id: "cluster-a".to_string(),
        message: "status changed".to_string(),
        reason: "PolicyStatusSync".to_string(),
        count: 1,
        compliance: Compliance::NonCompliant,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).single().expect("timestamp"),
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn out_of_order_and_duplicate_delivery_converges_to_newest() {
    let store = Arc::new(MemoryStore::new());
    let mut engine = SyncEngine::from_config(&manager_config(), store.clone()).expect("engine");
    let (producer, receiver) = ChannelTransport::new(64).split();
    engine.start(receiver);

    // 1, 3, 2 plus duplicates, interleaved across two hubs.
    for message in [
        clusters_message("hub1", 1, &["a", "b"]),
        clusters_message("hub2", 1, &["x"]),
        clusters_message("hub1", 3, &["a"]),
        clusters_message("hub1", 2, &["a", "b", "c"]),
        clusters_message("hub1", 3, &["a"]),
        clusters_message("hub2", 1, &["x"]),
    ] {
        producer.send(message).await.expect("send");
    }

    let manager = Arc::clone(engine.manager());
    eventually(|| {
        manager.unit("hub1").and_then(|u| u.last_applied_version("ManagedClusters"))
            == Some(BundleVersion::new(1, 3))
            && manager.unit("hub2").and_then(|u| u.last_applied_version("ManagedClusters"))
                == Some(BundleVersion::new(1, 1))
    })
    .await;

    let hub1 = store.objects(StatusTable::ManagedClusters, "hub1");
    assert_eq!(hub1.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(hub1[0].resource_version, "3");
    assert_eq!(store.objects(StatusTable::ManagedClusters, "hub2").len(), 1);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.conflation_units, 2);
    assert_eq!(snapshot.for_type("ManagedClusters").expect("stats").total_received, 6);
    assert!(snapshot.for_type("ManagedClusters").expect("stats").stale_dropped >= 2);

    engine.shutdown().await;
}

#[tokio::test]
async fn agent_syncer_feeds_engine_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let mut engine = SyncEngine::from_config(&manager_config(), store.clone()).expect("engine");
    let (producer, receiver) = ChannelTransport::new(64).split();
    engine.start(receiver);

    let agent_config = AgentConfig::new("hub1", "in-process");
    let mut syncer = StatusSyncer::new(&agent_config, Arc::new(producer)).with_heartbeat();
    let clusters: Arc<AgentBundle<StatusObject>> =
        Arc::new(AgentBundle::new("hub1", BundleKind::ManagedClusters));
    let events: Arc<AgentBundle<PolicyEvent>> =
        Arc::new(AgentBundle::new("hub1", BundleKind::LocalPolicyEvents));
    syncer.add_bundle(clusters.clone(), EligibilityPolicy::Always);
    syncer.add_bundle(events.clone(), EligibilityPolicy::LocalPoliciesEnabled);

    clusters.upsert(StatusObject::new("uid-1", "cluster-a", "10"));
    clusters.upsert(StatusObject::new("uid-2", "cluster-b", "4"));
    events.upsert(event("policy-1.17a"));
    assert_eq!(syncer.sync_once().await, 3);

    // Same event again plus a removed cluster.
    events.upsert(event("policy-1.17a"));
    events.upsert(event("policy-1.17b"));
    clusters.remove("uid-2");
    assert_eq!(syncer.sync_once().await, 3);

    eventually(|| {
        store.events("hub1").len() == 2
            && store.objects(StatusTable::ManagedClusters, "hub1").len() == 1
            && store.heartbeat("hub1").is_some()
    })
    .await;

    let unit = engine.manager().unit("hub1").expect("unit");
    eventually(|| unit.slot_status("ManagedClusters") == Some(SlotStatus::Empty)).await;

    engine.shutdown().await;
}

#[tokio::test]
async fn storage_failure_of_one_hub_does_not_block_another() {
    let store = Arc::new(MemoryStore::new());
    store.fail_source("hub-down");
    let mut engine = SyncEngine::from_config(&manager_config(), store.clone()).expect("engine");
    let (producer, receiver) = ChannelTransport::new(16).split();
    engine.start(receiver);

    producer.send(clusters_message("hub-down", 1, &["a"])).await.expect("send");
    producer.send(clusters_message("hub-up", 1, &["b"])).await.expect("send");

    eventually(|| store.objects(StatusTable::ManagedClusters, "hub-up").len() == 1).await;
    eventually(|| engine.snapshot().total_failures() == 1).await;
    assert!(store.objects(StatusTable::ManagedClusters, "hub-down").is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn failed_event_bundle_is_applied_when_redelivered() {
    let store = Arc::new(MemoryStore::new());
    store.fail_source("hub1");
    let mut engine = SyncEngine::from_config(&manager_config(), store.clone()).expect("engine");
    let (producer, receiver) = ChannelTransport::new(16).split();
    engine.start(receiver);

    let bundle = ObjectsBundle::new(
        "hub1",
        BundleVersion::new(1, 5),
        vec![event("policy-1.17a"), event("policy-1.17b")],
    );
    let payload = encode_payload("LocalPolicyEvents", &bundle).expect("encode");
    let message = TransportMessage::new("hub1", "LocalPolicyEvents", payload);

    producer.send(message.clone()).await.expect("send");
    eventually(|| engine.snapshot().total_failures() == 1).await;
    let manager = Arc::clone(engine.manager());
    eventually(|| {
        manager.unit("hub1").and_then(|u| u.slot_status("LocalPolicyEvents"))
            == Some(SlotStatus::Empty)
    })
    .await;
    assert!(store.events("hub1").is_empty());

    store.heal_source("hub1");
    producer.send(message).await.expect("send");
    eventually(|| store.events("hub1").len() == 2).await;

    let unit = manager.unit("hub1").expect("unit");
    eventually(|| unit.last_applied_version("LocalPolicyEvents") == Some(BundleVersion::new(1, 5)))
        .await;

    engine.shutdown().await;
}

/// Heartbeat handler that takes a while.
struct SlowHeartbeatHandler;

#[async_trait]
impl BundleHandler for SlowHeartbeatHandler {
    async fn handle(
        &self,
        bundle: &ManagerBundle,
        store: &dyn StatusStore,
    ) -> Result<(), HandlerError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        HeartbeatHandler.handle(bundle, store).await
    }
}

#[tokio::test]
async fn statistics_taken_after_shutdown_include_drained_work() {
    let mut registry = BundleRegistry::new();
    registry
        .register(ConflationRegistration::new(
            priority::HUB_HEARTBEAT,
            BundleMode::CompleteState,
            BundleKind::HubHeartbeat,
            Arc::new(SlowHeartbeatHandler),
        ))
        .expect("register");
    let store = Arc::new(MemoryStore::new());
    let mut engine = SyncEngine::builder()
        .registry(registry)
        .store(store.clone())
        .worker_pool_size(1)
        .build()
        .expect("engine");
    let (producer, receiver) = ChannelTransport::new(4).split();
    engine.start(receiver);

    let heartbeat = HeartbeatBundle {
        source: "hub1".to_string(),
        version: BundleVersion::new(1, 1),
        reported_at: Utc::now(),
    };
    let payload = encode_payload("HubHeartbeat", &heartbeat).expect("encode");
    producer.send(TransportMessage::new("hub1", "HubHeartbeat", payload)).await.expect("send");

    let manager = Arc::clone(engine.manager());
    eventually(|| {
        manager.unit("hub1").and_then(|u| u.slot_status("HubHeartbeat"))
            == Some(SlotStatus::InFlight)
    })
    .await;

    let statistics = Arc::clone(engine.statistics());
    assert_eq!(statistics.snapshot().for_type("HubHeartbeat").expect("stats").processing.successes, 0);
    engine.shutdown().await;

    let snapshot = statistics.snapshot();
    assert_eq!(snapshot.for_type("HubHeartbeat").expect("stats").processing.successes, 1);
    assert!(store.heartbeat("hub1").is_some());
}

#[test]
fn empty_registry_is_rejected() {
    let result = SyncEngine::builder()
        .registry(BundleRegistry::new())
        .store(Arc::new(MemoryStore::new()))
        .build();

    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::MissingRegistration { .. }))
    ));
}

#[test]
fn invalid_statistics_interval_is_rejected() {
    let config = ManagerConfig { statistics_log_interval: "soon".to_string(), ..manager_config() };
    let result = SyncEngine::from_config(&config, Arc::new(MemoryStore::new()));
    assert!(matches!(result, Err(EngineError::Config(ConfigError::ValidationError { .. }))));
}
