//! Last-writer-wins register (state-based only).

use crate::traits::{ReplicaId, StateBasedCrdt};
use serde::{Deserialize, Serialize};

/// Register keeping the value with the greatest `(timestamp, replica)`.
///
/// Writers must not reuse a `(timestamp, replica)` pair for different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    value: T,
    timestamp: u64,
    replica: ReplicaId,
}

impl<T: Clone> LwwRegister<T> {
    pub fn new(value: T, timestamp: u64, replica: ReplicaId) -> Self {
        Self {
            value,
            timestamp,
            replica,
        }
    }

    /// Write `value` if it is newer than the current one; returns whether it was applied
    pub fn set(&mut self, value: T, timestamp: u64, replica: ReplicaId) -> bool {
        if (timestamp, &replica) > (self.timestamp, &self.replica) {
            self.value = value;
            self.timestamp = timestamp;
            self.replica = replica;
            true
        } else {
            false
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl<T> StateBasedCrdt for LwwRegister<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn merge(&mut self, other: &Self) {
        if (other.timestamp, &other.replica) > (self.timestamp, &self.replica) {
            *self = other.clone();
        }
    }
}
