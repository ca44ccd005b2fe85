//! Contracts every concrete replicated data type implements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a replica producing updates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A state-based CRDT: a join-semilattice.
///
/// `merge` must be commutative, associative and idempotent.
pub trait StateBasedCrdt: Clone + Send + Sync + 'static {
    /// Join `other` into `self`
    fn merge(&mut self, other: &Self);
}

/// A CRDT that additionally tracks the changes made since the last reset.
///
/// Merging every delta produced by a replica, in order, into a fresh value
/// yields the same state as merging that replica's full state.
pub trait DeltaCrdt: StateBasedCrdt {
    type Delta: Clone + Send + Sync + 'static;

    /// Changes accumulated since the last [`reset_delta`](Self::reset_delta)
    fn delta(&self) -> Option<&Self::Delta>;

    /// Join a delta produced by some replica into `self`
    fn merge_delta(&mut self, delta: &Self::Delta);

    /// Forget the accumulated changes
    fn reset_delta(&mut self);
}
