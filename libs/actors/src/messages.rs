//! Message Traits and Wire Envelope
//!
//! Local delivery moves the message value itself through the recipient's
//! mailbox. Messages bound for another node are bincode-encoded into a
//! [`WireEnvelope`], which names the recipient by [`ActorAddress`] so the
//! receiving system can route it to an exported actor.

use crate::address::{ActorAddress, NodeId};
use crate::error::Result;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Anything an actor can receive.
pub trait Message: Send + 'static {}

impl<T: Send + 'static> Message for T {}

/// Messages that may cross node boundaries.
pub trait RemoteMessage: Message + Serialize + DeserializeOwned {}

impl<T> RemoteMessage for T where T: Message + Serialize + DeserializeOwned {}

/// Routing envelope for a remote tell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Node that sent the message
    pub sender_node: NodeId,
    /// Exported actor the payload is addressed to
    pub recipient: ActorAddress,
    /// Rust type name of the payload, for diagnostics only
    pub message_type: String,
    /// bincode-encoded message
    pub payload: Vec<u8>,
    /// Send time (nanoseconds since the Unix epoch)
    pub timestamp_ns: u64,
}

impl WireEnvelope {
    /// Encode `message` for `recipient`
    pub fn wrap<M: RemoteMessage>(
        sender_node: NodeId,
        recipient: ActorAddress,
        message: &M,
    ) -> Result<Self> {
        Ok(Self {
            sender_node,
            recipient,
            message_type: std::any::type_name::<M>().to_string(),
            payload: bincode::serialize(message)?,
            timestamp_ns: now_ns(),
        })
    }

    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Decode the payload as `M`
    pub fn open<M: RemoteMessage>(&self) -> Result<M> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}
