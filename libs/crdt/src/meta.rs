//! Runtime type identity tokens.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies the concrete type behind an erased value.
///
/// Two tags are equal iff they were created for the same Rust type. The type
/// name is carried for diagnostics only.
#[derive(Clone, Copy)]
pub struct MetaType {
    id: TypeId,
    name: &'static str,
}

impl MetaType {
    /// Tag for `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Whether this tag identifies `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MetaType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MetaType {}

impl Hash for MetaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaType({})", self.name)
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
