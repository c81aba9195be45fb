//! Conflation engine (central side).
//!
//! Bundles are routed by source into a `ConflationUnit`, where each
//! (source, bundle-type) slot keeps at most one pending bundle:
//!
//! ```text
//!   Empty --insert--> Pending --select--> InFlight --complete--> Empty
//!                      |  ^                  |                    |
//!                      +--+ newer replaces   +-- insert waits ----+--> Pending
//! ```
//!
//! Pending slots are indexed by registered priority in the manager's ready
//! queue, which the worker pool drains.

mod manager;
mod ready_queue;
mod registry;
mod unit;


pub use manager::ConflationManager;
pub use ready_queue::SlotKey;
pub use registry::{priority, BundleRegistry, ConflationRegistration, Priority};
pub use unit::{ConflationUnit, InsertOutcome, ReadyBundle, SlotStatus};
