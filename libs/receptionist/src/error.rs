//! Receptionist Error Types

use mycelium_actors::ActorError;
use mycelium_crdt::CrdtError;
use thiserror::Error;

/// Receptionist error type
#[derive(Error, Debug)]
pub enum ReceptionistError {
    /// The receptionist actor could not be spawned, exported or reached
    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// A replicated entry held or received a value of the wrong type
    #[error("Replication error for key {key}: {source}")]
    Replication {
        key: String,
        #[source]
        source: CrdtError,
    },

    /// The receptionist stopped before answering
    #[error("Receptionist on node {node} is not running")]
    NotRunning { node: String },
}

/// Result type alias for receptionist operations
pub type Result<T> = std::result::Result<T, ReceptionistError>;

impl ReceptionistError {
    /// Create a replication error for one key
    pub fn replication(key: impl ToString, source: CrdtError) -> Self {
        Self::Replication {
            key: key.to_string(),
            source,
        }
    }

    /// Whether the failure was an ask that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Actor(error) if error.is_timeout())
    }
}
