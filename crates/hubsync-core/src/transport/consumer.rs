use std::sync::Arc;
use tokio::sync::watch;

use super::BundleReceiver;
use crate::conflation::{ConflationManager, InsertOutcome};
use crate::prometheus;

/// Drain `receiver` into the conflation manager until shutdown or until the
/// transport closes. Decode failures are logged and the message dropped.
pub async fn run_consumer<R: BundleReceiver>(
    manager: Arc<ConflationManager>,
    mut receiver: R,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            message = receiver.recv() => message,
            _ = shutdown_rx.changed() => {
                tracing::info!("Bundle consumer shutting down");
                break;
            }
        };
        let Some(message) = message else {
            tracing::info!("Transport closed, bundle consumer exiting");
            break;
        };

        match manager.route(&message.source, &message.bundle_type, &message.payload) {
            Ok(InsertOutcome::Stale) => {
                tracing::debug!("Dropped stale bundle {}", message.key);
            },
            Ok(_) => {},
            Err(err) => {
                prometheus::record_decode_error();
                tracing::warn!("Dropped bundle {}: {}", message.key, err);
            },
        }
    }
}
