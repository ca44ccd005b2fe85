//! Actor Runtime Error Types
//!
//! `ActorError` covers failures reported to callers of the runtime API
//! (spawning, resolving, ask timeouts, wire encoding). `ActorFault` is the
//! value a handler failure turns into; it only ever reaches the supervisor.

use crate::address::{ActorAddress, NodeId};
use thiserror::Error;

/// Runtime error type
#[derive(Error, Debug)]
pub enum ActorError {
    /// Another live actor already owns the path
    #[error("Actor name '{path}' is already taken")]
    NameTaken { path: String },

    /// Name rejected before spawning
    #[error("Invalid actor name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// No reply arrived before the deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Wire encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Transport could not hand bytes to the peer node
    #[error("Node {node} unreachable: {reason}")]
    Unreachable { node: NodeId, reason: String },

    /// Inbound message for an actor that accepts no remote traffic
    #[error("No exported actor at {address}")]
    NotExported { address: ActorAddress },

    /// Address belongs to another node
    #[error("Address {address} is not local to node {node}")]
    NotLocal { address: ActorAddress, node: NodeId },

    /// System refuses new work once shutdown began
    #[error("Actor system is shutting down")]
    ShuttingDown,

    /// Spawning needs a tokio runtime
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn unreachable(node: &NodeId, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            node: node.clone(),
            reason: reason.into(),
        }
    }

    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failure raised while running a behavior
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorFault {
    /// Handler returned an error
    #[error("Handler failed: {0}")]
    Failed(String),

    /// Handler panicked; the payload message is kept when it is a string
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Behavior that can never be installed (e.g. `Same` at spawn)
    #[error("Invalid behavior: {0}")]
    InvalidBehavior(String),
}

impl ActorFault {
    /// Create a handler failure, usable directly with `map_err`
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }

    pub fn invalid_behavior(reason: impl Into<String>) -> Self {
        Self::InvalidBehavior(reason.into())
    }

    /// Short category used as a log field
    pub fn category(&self) -> &'static str {
        match self {
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
            Self::InvalidBehavior(_) => "invalid_behavior",
        }
    }
}
