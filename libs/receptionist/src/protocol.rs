//! Receptionist Protocol
//!
//! Commands accepted by a receptionist actor, the wire form other nodes use
//! to reach it, and the replication messages exchanged between
//! receptionists. Typed guests and listing destinations are erased here so
//! one actor can serve every key.

use crate::key::{Key, KeyId, Listing};
use mycelium_actors::{ActorAddress, ActorRef, ActorSystem, NodeId, RemoteMessage};
use mycelium_crdt::{ORSet, ORSetDelta, ReplicaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Replicated set of guest addresses held per key
pub type AddressSet = ORSet<ActorAddress>;

/// Delta of an [`AddressSet`]
pub type AddressDelta = ORSetDelta<ActorAddress>;

/// Acknowledgement of a `Register`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub key: KeyId,
    pub guest: ActorAddress,
}

/// Acknowledgement of a `Deregister`; `removed` is false when the guest was
/// not registered under the key on this node's view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deregistered {
    pub key: KeyId,
    pub guest: ActorAddress,
    pub removed: bool,
}

type Deliver = Box<dyn Fn(&ActorSystem, &BTreeSet<ActorAddress>) -> bool + Send>;

/// Destination for the listings of one key, with the guest type erased.
pub struct ListingSink {
    address: ActorAddress,
    deliver: Deliver,
}

impl ListingSink {
    pub fn new<G: RemoteMessage>(key: Key<G>, destination: ActorRef<Listing<G>>) -> Self {
        let address = destination.address().clone();
        let deliver = Box::new(move |system: &ActorSystem, members: &BTreeSet<ActorAddress>| {
            if destination.is_terminated() {
                return false;
            }
            let refs = members.iter().map(|member| system.resolve::<G>(member)).collect();
            destination.tell(Listing::new(key.clone(), refs));
            true
        });
        Self { address, deliver }
    }

    /// Destination on another node that accepts [`RemoteListing`].
    ///
    /// Remote destinations cannot be watched, so they count as alive.
    pub fn remote(key: KeyId, address: ActorAddress) -> Self {
        let destination = address.clone();
        let deliver = Box::new(move |system: &ActorSystem, members: &BTreeSet<ActorAddress>| {
            let listing = RemoteListing {
                key: key.clone(),
                members: members.iter().cloned().collect(),
            };
            system.resolve::<RemoteListing>(&destination).tell(listing);
            true
        });
        Self { address, deliver }
    }

    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Send the listing; returns false once the destination is gone
    pub fn deliver(&self, system: &ActorSystem, members: &BTreeSet<ActorAddress>) -> bool {
        (self.deliver)(system, members)
    }
}

impl fmt::Debug for ListingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingSink")
            .field("address", &self.address)
            .finish()
    }
}

/// Messages handled by a receptionist actor
#[derive(Debug)]
pub enum ReceptionistCommand {
    Register {
        key: KeyId,
        guest: ActorAddress,
        reply_to: Option<ActorRef<Registered>>,
    },
    Deregister {
        key: KeyId,
        guest: ActorAddress,
        reply_to: Option<ActorRef<Deregistered>>,
    },
    /// Reply once with the current listing
    Lookup { key: KeyId, reply_to: ListingSink },
    /// Current listing now, then one after every change
    Subscribe { key: KeyId, subscriber: ListingSink },
    /// A peer receptionist became reachable
    PeerUp(NodeId),
    /// A peer left; its guests are hidden until it is up again
    PeerDown(NodeId),
    Replicate(ReplicationMessage),
    /// Gossip timer
    Tick,
    GuestTerminated(ActorAddress),
    SubscriberTerminated { key: KeyId, subscriber: ActorAddress },
}

impl ReceptionistCommand {
    /// Command for a wire message received from another node
    pub fn from_wire(wire: ReceptionistWire) -> Self {
        match wire {
            ReceptionistWire::Register { key, guest } => Self::Register {
                key,
                guest,
                reply_to: None,
            },
            ReceptionistWire::Deregister { key, guest } => Self::Deregister {
                key,
                guest,
                reply_to: None,
            },
            ReceptionistWire::Lookup { key, reply_to } => Self::Lookup {
                reply_to: ListingSink::remote(key.clone(), reply_to),
                key,
            },
            ReceptionistWire::Subscribe { key, subscriber } => Self::Subscribe {
                subscriber: ListingSink::remote(key.clone(), subscriber),
                key,
            },
            ReceptionistWire::Replicate(message) => Self::Replicate(message),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Deregister { .. } => "deregister",
            Self::Lookup { .. } => "lookup",
            Self::Subscribe { .. } => "subscribe",
            Self::PeerUp(_) => "peer_up",
            Self::PeerDown(_) => "peer_down",
            Self::Replicate(_) => "replicate",
            Self::Tick => "tick",
            Self::GuestTerminated(_) => "guest_terminated",
            Self::SubscriberTerminated { .. } => "subscriber_terminated",
        }
    }
}

/// What a receptionist accepts from other nodes.
///
/// Listings for `Lookup` and `Subscribe` go to the given address as
/// [`RemoteListing`], so that actor must be exported for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReceptionistWire {
    Register { key: KeyId, guest: ActorAddress },
    Deregister { key: KeyId, guest: ActorAddress },
    Lookup { key: KeyId, reply_to: ActorAddress },
    Subscribe { key: KeyId, subscriber: ActorAddress },
    Replicate(ReplicationMessage),
}

/// Listing sent to a requester on another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListing {
    pub key: KeyId,
    pub members: Vec<ActorAddress>,
}

impl RemoteListing {
    /// Typed listing with references resolved from this node; `None` when
    /// the listing belongs to a different key
    pub fn resolve<G: RemoteMessage>(&self, key: &Key<G>, system: &ActorSystem) -> Option<Listing<G>> {
        if self.key != *key.id() {
            return None;
        }
        let refs = self.members.iter().map(|member| system.resolve::<G>(member)).collect();
        Some(Listing::new(key.clone(), refs))
    }
}

/// Pending changes of one key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDelta {
    pub key: KeyId,
    pub delta: AddressDelta,
}

/// Full replicated state of one key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyState {
    pub key: KeyId,
    pub state: AddressSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicationPayload {
    Deltas(Vec<KeyDelta>),
    /// Anti-entropy push, repairs lost deltas
    FullState(Vec<KeyState>),
}

/// Wire message between receptionists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationMessage {
    pub from: NodeId,
    pub replica: ReplicaId,
    pub payload: ReplicationPayload,
}

impl ReplicationMessage {
    pub fn key_count(&self) -> usize {
        match &self.payload {
            ReplicationPayload::Deltas(deltas) => deltas.len(),
            ReplicationPayload::FullState(states) => states.len(),
        }
    }
}
