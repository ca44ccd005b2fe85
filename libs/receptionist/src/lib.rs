//! Distributed Receptionist
//!
//! A registry mapping typed [`Key`]s to the actors registered under them.
//! Each node runs one receptionist actor; registrations are kept in a
//! delta-state ORSet per key and replicated to peer receptionists, so
//! every node converges on the same listings without coordination.
//!
//! # Architecture
//!
//! ```text
//!  node "a"                                   node "b"
//! ┌──────────────────────────┐               ┌──────────────────────────┐
//! │ Receptionist (handle)    │               │ Receptionist (handle)    │
//! │   │ Register/Lookup/...  │               │                          │
//! │   ▼                      │  Replicate    │                          │
//! │ receptionist actor ──────┼── deltas ────▶│ receptionist actor       │
//! │   RegistryStore          │◀─ full state ─┼─  RegistryStore          │
//! │   KeyId → AnyDeltaCrdt   │               │   KeyId → AnyDeltaCrdt   │
//! │   KeyId → subscribers    │               │   KeyId → subscribers    │
//! └──────────────────────────┘               └──────────────────────────┘
//! ```
//!
//! Other nodes reach a receptionist through [`ReceptionistWire`]; remote
//! lookups and subscriptions are answered with [`RemoteListing`].
//!
//! Listings are eventually consistent: a lookup right after a remote
//! registration may not include it until the delta has arrived.

pub mod client;
pub mod error;
pub mod key;
pub mod protocol;
pub mod service;
pub mod store;

pub use client::Receptionist;
pub use error::{ReceptionistError, Result};
pub use key::{Key, KeyId, Listing};
pub use protocol::{
    AddressDelta, AddressSet, Deregistered, KeyDelta, KeyState, ListingSink, ReceptionistCommand,
    ReceptionistWire, Registered, RemoteListing, ReplicationMessage, ReplicationPayload,
};
pub use service::{receptionist, receptionist_on};
pub use store::RegistryStore;
