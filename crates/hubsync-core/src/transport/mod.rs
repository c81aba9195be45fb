//! Transport boundary.
//!
//! Delivery is at-least-once and unordered; the conflation engine absorbs
//! duplicates and reordering. Adapters:
//! - `ChannelTransport` - in-process tokio channel
//! - `TcpBundleListener` / `TcpBundleProducer` - JSON lines over TCP

mod channel;
mod consumer;
mod tcp;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

pub use channel::{ChannelProducer, ChannelReceiver, ChannelTransport};
pub use consumer::run_consumer;
pub use tcp::{TcpBundleListener, TcpBundleProducer, MAX_LINE_LENGTH};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// One bundle in transit.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMessage {
    /// Destination key, `<source>.<bundle_type>`
    pub key: String,
    pub bundle_type: String,
    pub source: String,
    /// Encoded bundle
    pub payload: Bytes,
}

impl TransportMessage {
    pub fn new(
        source: impl Into<String>,
        bundle_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        let source = source.into();
        let bundle_type = bundle_type.into();
        Self { key: format!("{source}.{bundle_type}"), bundle_type, source, payload: payload.into() }
    }
}

/// Sending half, used by agents.
#[async_trait]
pub trait BundleProducer: Send + Sync {
    /// Returns once the transport accepted the message.
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError>;
}

/// Receiving half, drained by the manager's consumer task.
#[async_trait]
pub trait BundleReceiver: Send {
    /// Next message; `None` once the transport is closed.
    async fn recv(&mut self) -> Option<TransportMessage>;
}
