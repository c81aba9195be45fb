//! # hubsync Core
//!
//! Bundle conflation and delivery-ordering engine for leaf hubs reporting to
//! a central store.
//!
//! ## Architecture
//!
//! ```text
//! hubsync-core/src/
//! ├── agent/        # leaf hub side: live bundles, outgoing gate, sync loop
//! ├── transport/    # message boundary: channel and TCP adapters, consumer
//! ├── conflation/   # registry, per-source units, ready queue, manager
//! ├── dispatcher/   # fixed-size worker pool
//! ├── handlers/     # built-in bundle handlers
//! ├── storage/      # StatusStore boundary: memory and PostgreSQL
//! ├── statistics/   # counters, latencies, snapshot timer
//! ├── prometheus.rs # metrics facade and exporter
//! └── engine.rs     # manager-side wiring and shutdown
//! ```
//!
//! Data flow: agent gate -> transport -> `ConflationManager::route` ->
//! conflation unit -> worker pool -> handler -> storage.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards are scoped to the slot update they protect"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::needless_collect,
        clippy::assertions_on_result_states
    )
)]

pub mod agent;
pub mod conflation;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod prometheus;
pub mod statistics;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use conflation::{BundleRegistry, ConflationManager, ConflationRegistration, InsertOutcome};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{EngineError, EngineResult, HandlerError, TransportError};
pub use handlers::{register_default_handlers, BundleHandler};
pub use storage::{MemoryStore, PostgresStore, StatusStore};
