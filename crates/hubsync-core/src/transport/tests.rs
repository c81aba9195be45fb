use super::*;
use chrono::Utc;
use hubsync_types::bundle::encode_payload;
use hubsync_types::{BundleVersion, HeartbeatBundle};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

use crate::conflation::{BundleRegistry, ConflationManager, SlotStatus};
use crate::error::TransportError;
use crate::handlers::register_default_handlers;
use crate::statistics::Statistics;

fn heartbeat_message(source: &str, value: u64) -> TransportMessage {
    let bundle = HeartbeatBundle {
        source: source.to_string(),
        version: BundleVersion::new(1, value),
        reported_at: Utc::now(),
    };
    TransportMessage::new(source, "HubHeartbeat", encode_payload("HubHeartbeat", &bundle).unwrap())
}

fn manager() -> Arc<ConflationManager> {
    let mut registry = BundleRegistry::new();
    register_default_handlers(&mut registry).unwrap();
    let statistics = Arc::new(Statistics::new(registry.bundle_types(), None));
    Arc::new(ConflationManager::new(registry, statistics))
}

#[test]
fn test_message_key() {
    let message = TransportMessage::new("hub1", "ManagedClusters", b"{}".to_vec());
    assert_eq!(message.key, "hub1.ManagedClusters");
}

#[tokio::test]
async fn test_channel_transport_delivers_in_order() {
    let (producer, mut receiver) = ChannelTransport::new(4).split();
    let first = heartbeat_message("hub1", 1);
    let second = heartbeat_message("hub1", 2);
    producer.send(first.clone()).await.unwrap();
    producer.send(second.clone()).await.unwrap();
    drop(producer);

    assert_eq!(receiver.recv().await, Some(first));
    assert_eq!(receiver.recv().await, Some(second));
    assert!(receiver.recv().await.is_none());
}

#[tokio::test]
async fn test_closed_channel_rejects_send() {
    let (producer, receiver) = ChannelTransport::new(1).split();
    drop(receiver);
    let err = producer.send(heartbeat_message("hub1", 1)).await.unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}

#[tokio::test]
async fn test_consumer_routes_and_skips_bad_messages() {
    let manager = manager();
    let (producer, receiver) = ChannelTransport::new(8).split();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    producer.send(TransportMessage::new("hub1", "Mystery", b"{}".to_vec())).await.unwrap();
    producer.send(TransportMessage::new("hub1", "HubHeartbeat", b"garbage".to_vec())).await.unwrap();
    producer.send(heartbeat_message("hub1", 1)).await.unwrap();
    drop(producer);

    // Returns once the channel is drained and closed.
    run_consumer(Arc::clone(&manager), receiver, shutdown_rx).await;

    let unit = manager.unit("hub1").unwrap();
    assert_eq!(unit.slot_status("HubHeartbeat"), Some(SlotStatus::Pending));
    assert_eq!(manager.statistics().snapshot().total_received(), 1);
}

#[tokio::test]
async fn test_consumer_stops_on_shutdown() {
    let manager = manager();
    let transport = ChannelTransport::new(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = tokio::spawn(run_consumer(manager, transport.receiver, shutdown_rx));
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), consumer).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_tcp_round_trip_skips_malformed_lines() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = TcpBundleListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut receiver, accept) = listener.spawn(16, shutdown_rx);

    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    raw.write_all(b"this is not an envelope\n\n").await.unwrap();
    raw.flush().await.unwrap();

    let producer = TcpBundleProducer::new(addr.to_string());
    let sent = heartbeat_message("hub1", 7);
    producer.send(sent.clone()).await.unwrap();

    let received =
        tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await.unwrap().unwrap();
    assert_eq!(received.key, sent.key);
    assert_eq!(received.source, "hub1");
    assert_eq!(received.bundle_type, "HubHeartbeat");

    let decoded = hubsync_types::bundle::decode_hub_heartbeat(&received.payload).unwrap();
    assert_eq!(decoded.version(), BundleVersion::new(1, 7));

    shutdown_tx.send(true).unwrap();
    accept.await.unwrap();
}

#[tokio::test]
async fn test_tcp_oversized_line_drops_only_that_peer() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = TcpBundleListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut receiver, accept) = listener.spawn(16, shutdown_rx);

    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    let _ = raw.write_all(&vec![b'x'; MAX_LINE_LENGTH + 1024]).await;
    let mut buf = [0u8; 16];
    let closed = tokio::time::timeout(Duration::from_secs(5), raw.read(&mut buf)).await.unwrap();
    assert!(matches!(closed, Ok(0) | Err(_)));

    let producer = TcpBundleProducer::new(addr.to_string());
    producer.send(heartbeat_message("hub2", 1)).await.unwrap();
    let received =
        tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await.unwrap().unwrap();
    assert_eq!(received.source, "hub2");

    shutdown_tx.send(true).unwrap();
    accept.await.unwrap();
}

#[tokio::test]
async fn test_tcp_producer_reports_unreachable_manager() {
    // Bind then drop to get a port nobody listens on.
    let addr = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let producer = TcpBundleProducer::new(addr.to_string());

    let err = producer.send(heartbeat_message("hub1", 1)).await.unwrap_err();
    assert!(matches!(err, TransportError::Io(_)));
}
