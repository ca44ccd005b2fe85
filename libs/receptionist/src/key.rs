//! Typed registry keys and the listings published for them.

use mycelium_actors::{ActorAddress, ActorRef, Message};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Untyped identity of a [`Key`]: the guest type tag and the string id.
///
/// This is what travels between receptionists and indexes the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId {
    pub guest_type: String,
    pub id: String,
}

impl KeyId {
    pub fn of<G: 'static>(id: impl Into<String>) -> Self {
        Self {
            guest_type: std::any::type_name::<G>().to_string(),
            id: id.into(),
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.id, self.guest_type)
    }
}

/// Registry namespace for actors accepting `G`.
///
/// Two keys are equal only when both the guest type and the id match, so
/// `Key::<Ping>::new("svc")` and `Key::<Pong>::new("svc")` never share
/// registrations.
pub struct Key<G> {
    id: KeyId,
    _guest: PhantomData<fn() -> G>,
}

impl<G: 'static> Key<G> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: KeyId::of::<G>(id),
            _guest: PhantomData,
        }
    }
}

impl<G> Key<G> {
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.id
    }
}

impl<G> Clone for Key<G> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _guest: PhantomData,
        }
    }
}

impl<G> PartialEq for Key<G> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<G> Eq for Key<G> {}

impl<G> Hash for Key<G> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<G> fmt::Debug for Key<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.id).finish()
    }
}

impl<G> fmt::Display for Key<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// Snapshot of the actors registered under one key, as seen by one node.
///
/// Only eventually consistent: a registration made on another node shows up
/// once its delta has arrived.
pub struct Listing<G: Message> {
    key: Key<G>,
    refs: Vec<ActorRef<G>>,
}

impl<G: Message> Listing<G> {
    pub(crate) fn new(key: Key<G>, mut refs: Vec<ActorRef<G>>) -> Self {
        refs.sort();
        refs.dedup();
        Self { key, refs }
    }

    pub fn key(&self) -> &Key<G> {
        &self.key
    }

    pub fn contains(&self, address: &ActorAddress) -> bool {
        self.refs.iter().any(|guest| guest.address() == address)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorRef<G>> {
        self.refs.iter()
    }

    /// Registered addresses, sorted
    pub fn addresses(&self) -> Vec<ActorAddress> {
        self.refs.iter().map(|guest| guest.address().clone()).collect()
    }

    pub fn into_refs(self) -> Vec<ActorRef<G>> {
        self.refs
    }
}

impl<G: Message> Clone for Listing<G> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            refs: self.refs.clone(),
        }
    }
}

impl<G: Message> fmt::Debug for Listing<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("key", &self.key)
            .field("refs", &self.addresses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Pong;

    #[test]
    fn test_key_identity_includes_guest_type() {
        let ping = Key::<Ping>::new("svc");
        assert_eq!(ping, Key::<Ping>::new("svc"));
        assert_ne!(ping, Key::<Ping>::new("other"));
        assert_ne!(ping.id(), Key::<Pong>::new("svc").id());
        assert_eq!(ping.name(), "svc");
    }

    #[test]
    fn test_key_id_display() {
        let key = KeyId {
            guest_type: "app::Ping".to_string(),
            id: "svc".to_string(),
        };
        assert_eq!(key.to_string(), "svc[app::Ping]");
    }
}
