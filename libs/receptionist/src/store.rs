//! Replicated registry store
//!
//! One [`AnyDeltaCrdt`] per key, each wrapping an [`AddressSet`]. Local
//! registrations mutate the set and accumulate a delta; deltas and full
//! states from peers are joined through the checked merge path so a
//! mismatched payload is reported instead of applied.

use crate::error::{ReceptionistError, Result};
use crate::key::KeyId;
use crate::protocol::{AddressDelta, AddressSet, KeyDelta, KeyState};
use mycelium_actors::ActorAddress;
use mycelium_crdt::{AnyDelta, AnyDeltaCrdt, AnyStateBasedCrdt, ReplicaId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
pub struct RegistryStore {
    replica: ReplicaId,
    entries: BTreeMap<KeyId, AnyDeltaCrdt>,
}

impl RegistryStore {
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            entries: BTreeMap::new(),
        }
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyId> {
        self.entries.keys()
    }

    /// Current members of `key`; empty for unknown keys
    pub fn members(&self, key: &KeyId) -> Result<BTreeSet<ActorAddress>> {
        match self.entries.get(key) {
            Some(entry) => Ok(set_of(key, entry)?.elements()),
            None => Ok(BTreeSet::new()),
        }
    }

    pub fn add(&mut self, key: &KeyId, guest: ActorAddress) -> Result<()> {
        let replica = self.replica.clone();
        self.set_mut(key)?.add(&replica, guest);
        Ok(())
    }

    /// Returns whether `guest` was a member
    pub fn remove(&mut self, key: &KeyId, guest: &ActorAddress) -> Result<bool> {
        match self.entries.get_mut(key) {
            Some(entry) => Ok(set_of_mut(key, entry)?.remove(guest)),
            None => Ok(false),
        }
    }

    /// Remove every member matching `predicate` from every key; returns the
    /// keys that changed
    pub fn remove_where<F>(&mut self, predicate: F) -> Result<Vec<KeyId>>
    where
        F: Fn(&ActorAddress) -> bool,
    {
        let mut changed = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            let set = set_of_mut(key, entry)?;
            let doomed: Vec<ActorAddress> =
                set.iter().filter(|member| predicate(member)).cloned().collect();
            if doomed.is_empty() {
                continue;
            }
            for member in &doomed {
                set.remove(member);
            }
            changed.push(key.clone());
        }
        Ok(changed)
    }

    /// Keys with at least one member matching `predicate`
    pub fn keys_where<F>(&self, predicate: F) -> Result<Vec<KeyId>>
    where
        F: Fn(&ActorAddress) -> bool,
    {
        let mut keys = Vec::new();
        for (key, entry) in &self.entries {
            if set_of(key, entry)?.iter().any(|member| predicate(member)) {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }

    /// Deltas accumulated since the last [`reset_deltas`](Self::reset_deltas)
    pub fn pending_deltas(&self) -> Result<Vec<KeyDelta>> {
        let mut pending = Vec::new();
        for (key, entry) in &self.entries {
            if let Some(delta) = entry.delta() {
                let delta = delta.downcast_ref::<AddressDelta>().cloned().ok_or_else(|| {
                    ReceptionistError::replication(
                        key,
                        mycelium_crdt::CrdtError::incompatible_delta_type(
                            std::any::type_name::<AddressDelta>(),
                            delta.meta_type().name(),
                        ),
                    )
                })?;
                pending.push(KeyDelta {
                    key: key.clone(),
                    delta,
                });
            }
        }
        Ok(pending)
    }

    pub fn reset_deltas(&mut self) {
        for entry in self.entries.values_mut() {
            entry.reset_delta();
        }
    }

    pub fn full_state(&self) -> Result<Vec<KeyState>> {
        self.entries
            .iter()
            .map(|(key, entry)| -> Result<KeyState> {
                Ok(KeyState {
                    key: key.clone(),
                    state: set_of(key, entry)?.clone(),
                })
            })
            .collect()
    }

    /// Join deltas from a peer; returns the keys whose members changed
    pub fn merge_deltas(&mut self, deltas: &[KeyDelta]) -> Result<Vec<KeyId>> {
        let mut changed = Vec::new();
        for KeyDelta { key, delta } in deltas {
            let entry = self.entry(key);
            let before = set_of(key, entry)?.elements();
            entry
                .try_merge_delta(&AnyDelta::new(delta.clone()))
                .map_err(|e| ReceptionistError::replication(key, e))?;
            if set_of(key, entry)?.elements() != before {
                changed.push(key.clone());
            }
        }
        Ok(changed)
    }

    /// Join full states from a peer; returns the keys whose members changed
    pub fn merge_states(&mut self, states: &[KeyState]) -> Result<Vec<KeyId>> {
        let mut changed = Vec::new();
        for KeyState { key, state } in states {
            let entry = self.entry(key);
            let before = set_of(key, entry)?.elements();
            entry
                .try_merge(&AnyStateBasedCrdt::new(state.clone()))
                .map_err(|e| ReceptionistError::replication(key, e))?;
            if set_of(key, entry)?.elements() != before {
                changed.push(key.clone());
            }
        }
        Ok(changed)
    }

    fn entry(&mut self, key: &KeyId) -> &mut AnyDeltaCrdt {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| AnyDeltaCrdt::new(AddressSet::new()))
    }

    fn set_mut(&mut self, key: &KeyId) -> Result<&mut AddressSet> {
        let entry = self.entry(key);
        set_of_mut(key, entry)
    }
}

fn set_of<'a>(key: &KeyId, entry: &'a AnyDeltaCrdt) -> Result<&'a AddressSet> {
    entry
        .underlying::<AddressSet>()
        .map_err(|e| ReceptionistError::replication(key, e))
}

fn set_of_mut<'a>(key: &KeyId, entry: &'a mut AnyDeltaCrdt) -> Result<&'a mut AddressSet> {
    entry
        .underlying_mut::<AddressSet>()
        .map_err(|e| ReceptionistError::replication(key, e))
}
