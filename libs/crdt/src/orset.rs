//! Add-wins observed-remove set (delta-state ORSet)
//!
//! Every add is tagged with a unique [`Dot`] `(replica, counter)`. A
//! [`CausalContext`] records every dot a replica has observed, so a merge can
//! tell "removed here" (dot observed, no longer present) from "not seen yet"
//! (dot unknown). Concurrent add and remove of the same element resolve in
//! favour of the add.
//!
//! Local mutations also accumulate an [`ORSetDelta`] holding only the dots
//! they touched; joining those deltas into another replica is equivalent to
//! joining the full state.

use crate::traits::{DeltaCrdt, ReplicaId, StateBasedCrdt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Unique identity of one add operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dot {
    pub replica: ReplicaId,
    pub counter: u64,
}

/// Set of observed dots: a contiguous clock per replica plus stray dots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalContext {
    clock: BTreeMap<ReplicaId, u64>,
    cloud: BTreeSet<Dot>,
}

impl CausalContext {
    pub fn contains(&self, dot: &Dot) -> bool {
        self.clock
            .get(&dot.replica)
            .is_some_and(|counter| dot.counter <= *counter)
            || self.cloud.contains(dot)
    }

    fn next_dot(&mut self, replica: &ReplicaId) -> Dot {
        let counter = self.clock.entry(replica.clone()).or_insert(0);
        *counter += 1;
        Dot {
            replica: replica.clone(),
            counter: *counter,
        }
    }

    fn from_dots(dots: impl IntoIterator<Item = Dot>) -> Self {
        let mut context = Self {
            clock: BTreeMap::new(),
            cloud: dots.into_iter().collect(),
        };
        context.compact();
        context
    }

    fn join(&mut self, other: &CausalContext) {
        for (replica, counter) in &other.clock {
            let mine = self.clock.entry(replica.clone()).or_insert(0);
            *mine = (*mine).max(*counter);
        }
        self.cloud.extend(other.cloud.iter().cloned());
        self.compact();
    }

    // Folds cloud dots that extend a replica's contiguous clock.
    // Relies on the cloud iterating in (replica, counter) order.
    fn compact(&mut self) {
        let cloud = std::mem::take(&mut self.cloud);
        for dot in cloud {
            let counter = self.clock.entry(dot.replica.clone()).or_insert(0);
            if dot.counter <= *counter {
                continue;
            }
            if dot.counter == *counter + 1 {
                *counter += 1;
                continue;
            }
            self.cloud.insert(dot);
        }
        self.clock.retain(|_, counter| *counter > 0);
    }
}

type Entries<T> = BTreeMap<T, BTreeSet<Dot>>;

fn join_entries<T: Ord + Clone>(
    entries: &mut Entries<T>,
    context: &CausalContext,
    other_entries: &Entries<T>,
    other_context: &CausalContext,
) {
    entries.retain(|element, dots| {
        let theirs = other_entries.get(element);
        dots.retain(|dot| {
            theirs.is_some_and(|theirs| theirs.contains(dot)) || !other_context.contains(dot)
        });
        !dots.is_empty()
    });

    for (element, theirs) in other_entries {
        let unseen: Vec<Dot> = theirs
            .iter()
            .filter(|dot| !context.contains(dot))
            .cloned()
            .collect();
        if !unseen.is_empty() {
            entries.entry(element.clone()).or_default().extend(unseen);
        }
    }
}

/// Changes accumulated by local [`ORSet`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de> + Ord"
))]
pub struct ORSetDelta<T> {
    entries: Entries<T>,
    context: CausalContext,
}

impl<T: Ord + Clone> ORSetDelta<T> {
    fn join(&mut self, other: &ORSetDelta<T>) {
        join_entries(&mut self.entries, &self.context, &other.entries, &other.context);
        self.context.join(&other.context);
    }

    /// Elements added by this delta
    pub fn added(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }
}

/// Add-wins observed-remove set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de> + Ord"
))]
pub struct ORSet<T> {
    entries: Entries<T>,
    context: CausalContext,
    #[serde(skip)]
    delta: Option<ORSetDelta<T>>,
}

impl<T> Default for ORSet<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            context: CausalContext::default(),
            delta: None,
        }
    }
}

impl<T: Ord + Clone> ORSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `element` on behalf of `replica`
    pub fn add(&mut self, replica: &ReplicaId, element: T) {
        let dot = self.context.next_dot(replica);
        let previous = self
            .entries
            .insert(element.clone(), BTreeSet::from([dot.clone()]))
            .unwrap_or_default();

        let delta = ORSetDelta {
            entries: BTreeMap::from([(element, BTreeSet::from([dot.clone()]))]),
            context: CausalContext::from_dots(previous.into_iter().chain(std::iter::once(dot))),
        };
        self.push_delta(delta);
    }

    /// Remove every observed add of `element`; returns whether it was present
    pub fn remove(&mut self, element: &T) -> bool {
        match self.entries.remove(element) {
            Some(dots) => {
                let delta = ORSetDelta {
                    entries: BTreeMap::new(),
                    context: CausalContext::from_dots(dots),
                };
                self.push_delta(delta);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, element: &T) -> bool {
        self.entries.contains_key(element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }

    /// Snapshot of the current elements
    pub fn elements(&self) -> BTreeSet<T> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_delta(&mut self, delta: ORSetDelta<T>) {
        self.delta = Some(match self.delta.take() {
            Some(mut accumulated) => {
                accumulated.join(&delta);
                accumulated
            }
            None => delta,
        });
    }
}

impl<T: Ord> PartialEq for ORSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.context == other.context
    }
}

impl<T: Ord> Eq for ORSet<T> {}

impl<T> StateBasedCrdt for ORSet<T>
where
    T: Ord + Clone + Send + Sync + 'static,
{
    fn merge(&mut self, other: &Self) {
        join_entries(&mut self.entries, &self.context, &other.entries, &other.context);
        self.context.join(&other.context);
    }
}

impl<T> DeltaCrdt for ORSet<T>
where
    T: Ord + Clone + Send + Sync + 'static,
{
    type Delta = ORSetDelta<T>;

    fn delta(&self) -> Option<&ORSetDelta<T>> {
        self.delta.as_ref()
    }

    fn merge_delta(&mut self, delta: &ORSetDelta<T>) {
        join_entries(&mut self.entries, &self.context, &delta.entries, &delta.context);
        self.context.join(&delta.context);
    }

    fn reset_delta(&mut self) {
        self.delta = None;
    }
}
