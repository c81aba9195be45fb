//! Bundle versions.
//!
//! Every bundle carries a `BundleVersion` that is totally ordered within one
//! (source, bundle-type) pair:
//!
//! - `generation` changes when the producer restarts
//! - `value` increments on every mutation within a generation
//!
//! Comparison is generation first, then value. Versions of different sources
//! or different bundle types are never compared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Version attached to a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleVersion {
    /// Producer incarnation, bumped on restart
    pub generation: u64,
    /// Mutation counter within the generation
    pub value: u64,
}

impl BundleVersion {
    pub const fn new(generation: u64, value: u64) -> Self {
        Self { generation, value }
    }

    /// Version for a freshly started producer.
    ///
    /// The generation is seeded from wall-clock milliseconds so a restarted
    /// agent outranks everything its previous incarnation sent.
    pub fn initial() -> Self {
        let generation = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self { generation, value: 0 }
    }

    /// Strictly newer than `other`.
    pub fn newer_than(&self, other: &Self) -> bool {
        self > other
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Bump the mutation counter.
    pub fn incr(&mut self) {
        self.value = self.value.saturating_add(1);
    }

    /// Start a new generation.
    pub fn next_generation(&mut self) {
        self.generation = self.generation.saturating_add(1);
        self.value = 0;
    }
}

impl fmt::Display for BundleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generation, self.value)
    }
}
