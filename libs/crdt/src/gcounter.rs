//! Grow-only counter.

use crate::traits::{DeltaCrdt, ReplicaId, StateBasedCrdt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-replica counts touched since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounterDelta {
    counts: BTreeMap<ReplicaId, u64>,
}

/// Grow-only counter: one monotonic count per replica, value is the sum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<ReplicaId, u64>,
    #[serde(skip)]
    delta: Option<GCounterDelta>,
}

fn join_counts(target: &mut BTreeMap<ReplicaId, u64>, other: &BTreeMap<ReplicaId, u64>) {
    for (replica, count) in other {
        let mine = target.entry(replica.clone()).or_insert(0);
        *mine = (*mine).max(*count);
    }
}

impl GCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, replica: &ReplicaId, by: u64) {
        let count = self.counts.entry(replica.clone()).or_insert(0);
        *count = count.saturating_add(by);
        let count = *count;
        self.delta
            .get_or_insert_with(GCounterDelta::default)
            .counts
            .insert(replica.clone(), count);
    }

    pub fn value(&self) -> u64 {
        self.counts.values().fold(0u64, |sum, count| sum.saturating_add(*count))
    }

    /// Count contributed by one replica
    pub fn count_of(&self, replica: &ReplicaId) -> u64 {
        self.counts.get(replica).copied().unwrap_or(0)
    }
}

impl PartialEq for GCounter {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl Eq for GCounter {}

impl StateBasedCrdt for GCounter {
    fn merge(&mut self, other: &Self) {
        join_counts(&mut self.counts, &other.counts);
    }
}

impl DeltaCrdt for GCounter {
    type Delta = GCounterDelta;

    fn delta(&self) -> Option<&GCounterDelta> {
        self.delta.as_ref()
    }

    fn merge_delta(&mut self, delta: &GCounterDelta) {
        join_counts(&mut self.counts, &delta.counts);
    }

    fn reset_delta(&mut self) {
        self.delta = None;
    }
}
