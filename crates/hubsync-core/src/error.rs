//! Unified error types for hubsync core.

use hubsync_types::{BundleError, ConfigError};
use std::time::Duration;
use thiserror::Error;

use crate::storage::StoreError;

/// Failure of a single handler invocation.
///
/// Recorded in statistics and contained to the (source, type) slot; never
/// retried by the engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Handler did not finish before its deadline.
    #[error("Handler exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// Handler panicked; the worker survives and the slot is released.
    #[error("Handler panicked")]
    Panicked,

    /// Handler received a bundle kind it was not registered for.
    #[error("Handler for {expected} received {actual} bundle")]
    UnexpectedBundle { expected: &'static str, actual: &'static str },
}

/// Transport adapter failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Socket-level I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Receiving side is gone.
    #[error("Transport channel closed")]
    Closed,
}

/// Main error type for engine setup and the ingest path.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// Registry or configuration problem, fatal at startup.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or unregistered bundle, dropped.
    #[error("Decode error: {0}")]
    Decode(#[from] BundleError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
