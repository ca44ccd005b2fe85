//! CRDT Error Types
//!
//! Failures raised at the erasure boundary when two erased values do not
//! share a concrete type.

use thiserror::Error;

/// Merge engine error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrdtError {
    /// State merge attempted between two different concrete types
    #[error("Incompatible CRDT types: expected {expected}, found {found}")]
    IncompatibleTypes {
        expected: &'static str,
        found: &'static str,
    },

    /// Delta merge attempted with a delta of the wrong type
    #[error("Incompatible delta type: expected {expected}, found {found}")]
    IncompatibleDeltaType {
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type alias for merge operations
pub type Result<T> = std::result::Result<T, CrdtError>;

impl CrdtError {
    /// Create an incompatible state type error
    pub fn incompatible_types(expected: &'static str, found: &'static str) -> Self {
        Self::IncompatibleTypes { expected, found }
    }

    /// Create an incompatible delta type error
    pub fn incompatible_delta_type(expected: &'static str, found: &'static str) -> Self {
        Self::IncompatibleDeltaType { expected, found }
    }
}
