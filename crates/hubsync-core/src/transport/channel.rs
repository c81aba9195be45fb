use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BundleProducer, BundleReceiver, TransportMessage};
use crate::error::TransportError;

/// In-process transport over a bounded tokio channel.
pub struct ChannelTransport {
    pub producer: ChannelProducer,
    pub receiver: ChannelReceiver,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { producer: ChannelProducer { tx }, receiver: ChannelReceiver { rx } }
    }

    pub fn split(self) -> (ChannelProducer, ChannelReceiver) {
        (self.producer, self.receiver)
    }

    /// Raw sender for adapters that feed a `ChannelReceiver` themselves.
    pub(super) fn sender_pair(capacity: usize) -> (mpsc::Sender<TransportMessage>, ChannelReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, ChannelReceiver { rx })
    }
}

#[derive(Clone)]
pub struct ChannelProducer {
    tx: mpsc::Sender<TransportMessage>,
}

#[async_trait]
impl BundleProducer for ChannelProducer {
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        self.tx.send(message).await.map_err(|_| TransportError::Closed)
    }
}

pub struct ChannelReceiver {
    rx: mpsc::Receiver<TransportMessage>,
}

#[async_trait]
impl BundleReceiver for ChannelReceiver {
    async fn recv(&mut self) -> Option<TransportMessage> {
        self.rx.recv().await
    }
}
