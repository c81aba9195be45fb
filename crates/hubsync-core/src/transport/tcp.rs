//! JSON-lines transport over TCP.
//!
//! Each line is one envelope: `{"key", "bundle_type", "source", "payload"}`
//! where `payload` is the bundle JSON itself. A line longer than
//! [`MAX_LINE_LENGTH`] closes the connection.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use super::{BundleProducer, ChannelReceiver, ChannelTransport, TransportMessage};
use crate::error::TransportError;

/// Longest accepted envelope line, in bytes.
pub const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    bundle_type: String,
    source: String,
    payload: serde_json::Value,
}

impl Envelope {
    fn encode(message: &TransportMessage) -> Result<Vec<u8>, TransportError> {
        let envelope = Self {
            key: message.key.clone(),
            bundle_type: message.bundle_type.clone(),
            source: message.source.clone(),
            payload: serde_json::from_slice(&message.payload)?,
        };
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        Ok(line)
    }

    fn decode(line: &str) -> Result<TransportMessage, TransportError> {
        let envelope: Self = serde_json::from_str(line)?;
        Ok(TransportMessage {
            key: envelope.key,
            bundle_type: envelope.bundle_type,
            source: envelope.source,
            payload: serde_json::to_vec(&envelope.payload)?.into(),
        })
    }
}

/// Manager-side listener feeding every connection into one receiver.
pub struct TcpBundleListener {
    listener: TcpListener,
}

impl TcpBundleListener {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Start accepting connections. Lines from all peers are merged into the
    /// returned receiver until shutdown.
    pub fn spawn(
        self,
        capacity: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (ChannelReceiver, JoinHandle<()>) {
        let (tx, receiver) = ChannelTransport::sender_pair(capacity);
        let handle = tokio::spawn(accept_loop(self.listener, tx, shutdown_rx));
        (receiver, handle)
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<TransportMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Bundle listener accepting on {}", addr);
    }
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Leaf hub connected from {}", peer);
                        tokio::spawn(read_connection(stream, peer, tx.clone(), shutdown_rx.clone()));
                    }
                    Err(err) => tracing::warn!("Accept failed: {}", err),
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("Bundle listener shutting down");
                break;
            }
        }
    }
}

async fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<TransportMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    loop {
        let line = tokio::select! {
            line = lines.next() => line,
            _ = shutdown_rx.changed() => break,
        };
        match line {
            Some(Ok(line)) if line.trim().is_empty() => {},
            Some(Ok(line)) => match Envelope::decode(&line) {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                },
                Err(err) => tracing::warn!("Skipping malformed line from {}: {}", peer, err),
            },
            None => {
                tracing::debug!("Leaf hub {} disconnected", peer);
                break;
            },
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!(
                    "Dropping {}: line exceeds {} bytes",
                    peer,
                    MAX_LINE_LENGTH
                );
                break;
            },
            Some(Err(err)) => {
                tracing::warn!("Read from {} failed: {}", peer, err);
                break;
            },
        }
    }
}

/// Agent-side producer. Connects lazily and reconnects on the next send
/// after a write failure.
pub struct TcpBundleProducer {
    addr: String,
    connection: Mutex<Option<BufWriter<TcpStream>>>,
}

impl TcpBundleProducer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), connection: Mutex::new(None) }
    }
}

#[async_trait]
impl BundleProducer for TcpBundleProducer {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let line = Envelope::encode(&message)?;
        let mut connection = self.connection.lock().await;

        if connection.is_none() {
            let stream = TcpStream::connect(&self.addr).await?;
            tracing::debug!("Connected to manager at {}", self.addr);
            *connection = Some(BufWriter::new(stream));
        }
        let Some(writer) = connection.as_mut() else {
            return Err(TransportError::Closed);
        };

        let written = async {
            writer.write_all(&line).await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = written {
            *connection = None;
            return Err(err.into());
        }
        Ok(())
    }
}
