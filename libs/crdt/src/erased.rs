//! Type-erased CRDT wrappers
//!
//! Generic replication code (the receptionist, gossip pipelines) holds many
//! concrete replicated types behind one interface. The wrappers here keep the
//! concrete value as `dyn Any`, tag it with a [`MetaType`], and capture the
//! concrete merge functions as monomorphised fn pointers at construction.
//!
//! Every operation comes in two forms:
//!
//! - `try_*` checks the tags and returns a [`CrdtError`] on mismatch, leaving
//!   both operands untouched.
//! - the unchecked form treats a mismatch as a broken invariant (two unrelated
//!   values conflated under one identity) and aborts the process.

use crate::error::{CrdtError, Result};
use crate::meta::MetaType;
use crate::traits::{DeltaCrdt, StateBasedCrdt};
use std::any::Any;
use std::fmt;
use tracing::error;

type Erased = Box<dyn Any + Send + Sync>;
type MergeFn = fn(&mut dyn Any, &dyn Any) -> bool;
type CloneFn = fn(&dyn Any) -> Option<Erased>;
type DeltaFn = fn(&dyn Any) -> Option<AnyDelta>;
type ResetDeltaFn = fn(&mut dyn Any);

fn merge_as<T: StateBasedCrdt>(target: &mut dyn Any, other: &dyn Any) -> bool {
    match (target.downcast_mut::<T>(), other.downcast_ref::<T>()) {
        (Some(target), Some(other)) => {
            target.merge(other);
            true
        }
        _ => false,
    }
}

fn merge_delta_as<T: DeltaCrdt>(target: &mut dyn Any, delta: &dyn Any) -> bool {
    match (target.downcast_mut::<T>(), delta.downcast_ref::<T::Delta>()) {
        (Some(target), Some(delta)) => {
            target.merge_delta(delta);
            true
        }
        _ => false,
    }
}

fn delta_as<T: DeltaCrdt>(value: &dyn Any) -> Option<AnyDelta> {
    value
        .downcast_ref::<T>()
        .and_then(|value| value.delta())
        .map(|delta| AnyDelta::new(delta.clone()))
}

fn reset_delta_as<T: DeltaCrdt>(value: &mut dyn Any) {
    if let Some(value) = value.downcast_mut::<T>() {
        value.reset_delta();
    }
}

fn clone_as<T: Clone + Send + Sync + 'static>(value: &dyn Any) -> Option<Erased> {
    value
        .downcast_ref::<T>()
        .map(|value| Box::new(value.clone()) as Erased)
}

fn abort_on_mismatch(error: CrdtError) -> ! {
    error!(
        error = %error,
        "Unchecked CRDT merge across incompatible types; aborting to avoid corrupting replicated state"
    );
    std::process::abort()
}

/// Erased state-based CRDT.
pub struct AnyStateBasedCrdt {
    meta_type: MetaType,
    underlying: Erased,
    merge_fn: MergeFn,
    clone_fn: CloneFn,
}

impl AnyStateBasedCrdt {
    /// Wrap a concrete value
    pub fn new<T: StateBasedCrdt>(value: T) -> Self {
        Self {
            meta_type: MetaType::of::<T>(),
            underlying: Box::new(value),
            merge_fn: merge_as::<T>,
            clone_fn: clone_as::<T>,
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.meta_type
    }

    /// Join `other` into `self` if both wrap the same concrete type
    pub fn try_merge(&mut self, other: &AnyStateBasedCrdt) -> Result<()> {
        if other.meta_type != self.meta_type {
            return Err(CrdtError::incompatible_types(
                self.meta_type.name(),
                other.meta_type.name(),
            ));
        }
        let merge = self.merge_fn;
        if merge(self.underlying.as_mut(), other.underlying.as_ref()) {
            Ok(())
        } else {
            Err(CrdtError::incompatible_types(
                self.meta_type.name(),
                other.meta_type.name(),
            ))
        }
    }

    /// Join `other` into `self`, aborting the process on a type mismatch
    pub fn merge(&mut self, other: &AnyStateBasedCrdt) {
        if let Err(e) = self.try_merge(other) {
            abort_on_mismatch(e);
        }
    }

    /// Borrow the concrete value
    pub fn underlying<T: 'static>(&self) -> Result<&T> {
        self.underlying
            .downcast_ref::<T>()
            .ok_or_else(|| CrdtError::incompatible_types(self.meta_type.name(), std::any::type_name::<T>()))
    }

    /// Mutably borrow the concrete value, for local updates
    pub fn underlying_mut<T: 'static>(&mut self) -> Result<&mut T> {
        let name = self.meta_type.name();
        self.underlying
            .downcast_mut::<T>()
            .ok_or_else(|| CrdtError::incompatible_types(name, std::any::type_name::<T>()))
    }

    /// Unwrap into the concrete value, handing `self` back on mismatch
    pub fn into_underlying<T: 'static>(self) -> std::result::Result<T, Self> {
        if !self.meta_type.is::<T>() {
            return Err(self);
        }
        let Self {
            meta_type,
            underlying,
            merge_fn,
            clone_fn,
        } = self;
        underlying.downcast::<T>().map(|value| *value).map_err(|underlying| Self {
            meta_type,
            underlying,
            merge_fn,
            clone_fn,
        })
    }
}

impl Clone for AnyStateBasedCrdt {
    fn clone(&self) -> Self {
        let underlying = match (self.clone_fn)(self.underlying.as_ref()) {
            Some(value) => value,
            None => abort_on_mismatch(CrdtError::incompatible_types(
                self.meta_type.name(),
                "<clone>",
            )),
        };
        Self {
            meta_type: self.meta_type,
            underlying,
            merge_fn: self.merge_fn,
            clone_fn: self.clone_fn,
        }
    }
}

impl fmt::Debug for AnyStateBasedCrdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyStateBasedCrdt")
            .field("meta_type", &self.meta_type)
            .finish_non_exhaustive()
    }
}

/// Erased delta value, tagged with the delta's concrete type.
pub struct AnyDelta {
    meta_type: MetaType,
    underlying: Erased,
    clone_fn: CloneFn,
}

impl AnyDelta {
    pub fn new<D: Clone + Send + Sync + 'static>(delta: D) -> Self {
        Self {
            meta_type: MetaType::of::<D>(),
            underlying: Box::new(delta),
            clone_fn: clone_as::<D>,
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.meta_type
    }

    pub fn downcast_ref<D: 'static>(&self) -> Option<&D> {
        self.underlying.downcast_ref::<D>()
    }

    /// Unwrap into the concrete delta, handing `self` back on mismatch
    pub fn into_inner<D: 'static>(self) -> std::result::Result<D, Self> {
        let Self {
            meta_type,
            underlying,
            clone_fn,
        } = self;
        underlying.downcast::<D>().map(|delta| *delta).map_err(|underlying| Self {
            meta_type,
            underlying,
            clone_fn,
        })
    }
}

impl Clone for AnyDelta {
    fn clone(&self) -> Self {
        let underlying = match (self.clone_fn)(self.underlying.as_ref()) {
            Some(value) => value,
            None => abort_on_mismatch(CrdtError::incompatible_delta_type(
                self.meta_type.name(),
                "<clone>",
            )),
        };
        Self {
            meta_type: self.meta_type,
            underlying,
            clone_fn: self.clone_fn,
        }
    }
}

impl fmt::Debug for AnyDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyDelta")
            .field("meta_type", &self.meta_type)
            .finish_non_exhaustive()
    }
}

/// Erased delta-state CRDT.
///
/// Extends [`AnyStateBasedCrdt`] with the delta type tag and the three
/// delta operations of the concrete type.
#[derive(Clone)]
pub struct AnyDeltaCrdt {
    state: AnyStateBasedCrdt,
    delta_meta_type: MetaType,
    delta_fn: DeltaFn,
    merge_delta_fn: MergeFn,
    reset_delta_fn: ResetDeltaFn,
}

impl AnyDeltaCrdt {
    pub fn new<T: DeltaCrdt>(value: T) -> Self {
        Self {
            state: AnyStateBasedCrdt::new(value),
            delta_meta_type: MetaType::of::<T::Delta>(),
            delta_fn: delta_as::<T>,
            merge_delta_fn: merge_delta_as::<T>,
            reset_delta_fn: reset_delta_as::<T>,
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.state.meta_type()
    }

    pub fn delta_meta_type(&self) -> MetaType {
        self.delta_meta_type
    }

    /// The state-based view of this value
    pub fn as_state(&self) -> &AnyStateBasedCrdt {
        &self.state
    }

    pub fn try_merge(&mut self, other: &AnyStateBasedCrdt) -> Result<()> {
        self.state.try_merge(other)
    }

    pub fn merge(&mut self, other: &AnyStateBasedCrdt) {
        self.state.merge(other)
    }

    /// Pending changes since the last reset, if any
    pub fn delta(&self) -> Option<AnyDelta> {
        (self.delta_fn)(self.state.underlying.as_ref())
    }

    /// Join a delta into the state if it has this value's delta type
    pub fn try_merge_delta(&mut self, delta: &AnyDelta) -> Result<()> {
        if delta.meta_type != self.delta_meta_type {
            return Err(CrdtError::incompatible_delta_type(
                self.delta_meta_type.name(),
                delta.meta_type.name(),
            ));
        }
        let merge = self.merge_delta_fn;
        if merge(self.state.underlying.as_mut(), delta.underlying.as_ref()) {
            Ok(())
        } else {
            Err(CrdtError::incompatible_delta_type(
                self.delta_meta_type.name(),
                delta.meta_type.name(),
            ))
        }
    }

    /// Join a delta into the state, aborting the process on a type mismatch
    pub fn merge_delta(&mut self, delta: &AnyDelta) {
        if let Err(e) = self.try_merge_delta(delta) {
            abort_on_mismatch(e);
        }
    }

    /// Clear the accumulated delta.
    ///
    /// Only call once the delta has been handed to every known peer,
    /// otherwise those updates are never replicated by delta.
    pub fn reset_delta(&mut self) {
        (self.reset_delta_fn)(self.state.underlying.as_mut())
    }

    pub fn underlying<T: 'static>(&self) -> Result<&T> {
        self.state.underlying()
    }

    pub fn underlying_mut<T: 'static>(&mut self) -> Result<&mut T> {
        self.state.underlying_mut()
    }
}

impl fmt::Debug for AnyDeltaCrdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyDeltaCrdt")
            .field("meta_type", &self.state.meta_type)
            .field("delta_meta_type", &self.delta_meta_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcounter::GCounter;
    use crate::lww::LwwRegister;
    use crate::orset::ORSet;
    use crate::traits::ReplicaId;

    fn counter(replica: &str, n: u64) -> GCounter {
        let mut counter = GCounter::new();
        counter.increment(&ReplicaId::from(replica), n);
        counter
    }

    #[test]
    fn test_try_merge_dispatches_to_concrete_merge() {
        let mut a = AnyStateBasedCrdt::new(counter("a", 2));
        let b = AnyStateBasedCrdt::new(counter("b", 3));

        a.try_merge(&b).unwrap();

        assert_eq!(a.underlying::<GCounter>().unwrap().value(), 5);
        assert_eq!(b.underlying::<GCounter>().unwrap().value(), 3);
    }

    #[test]
    fn test_try_merge_rejects_different_types_and_leaves_operands_unchanged() {
        let mut a = AnyStateBasedCrdt::new(counter("a", 2));
        let b = AnyStateBasedCrdt::new(LwwRegister::new("x".to_string(), 1, ReplicaId::from("b")));

        let err = a.try_merge(&b).unwrap_err();

        assert!(matches!(err, CrdtError::IncompatibleTypes { .. }));
        assert_eq!(a.underlying::<GCounter>().unwrap(), &counter("a", 2));
        assert_eq!(b.underlying::<LwwRegister<String>>().unwrap().value(), "x");
    }

    #[test]
    fn test_try_merge_delta_rejects_foreign_delta() {
        let mut set = AnyDeltaCrdt::new(ORSet::<String>::new());
        let mut source = AnyDeltaCrdt::new(GCounter::new());
        source
            .underlying_mut::<GCounter>()
            .unwrap()
            .increment(&ReplicaId::from("a"), 1);
        let foreign = source.delta().unwrap();

        let err = set.try_merge_delta(&foreign).unwrap_err();

        assert!(matches!(err, CrdtError::IncompatibleDeltaType { .. }));
        assert!(set.underlying::<ORSet<String>>().unwrap().is_empty());
        assert!(set.delta().is_none());
    }

    #[test]
    fn test_delta_lifecycle() {
        let replica = ReplicaId::from("a");
        let mut source = AnyDeltaCrdt::new(ORSet::<String>::new());
        assert!(source.delta().is_none());

        source
            .underlying_mut::<ORSet<String>>()
            .unwrap()
            .add(&replica, "x".to_string());
        let delta = source.delta().expect("delta after add");
        assert_eq!(delta.meta_type(), source.delta_meta_type());

        let mut replica_b = AnyDeltaCrdt::new(ORSet::<String>::new());
        replica_b.try_merge_delta(&delta).unwrap();
        assert!(replica_b
            .underlying::<ORSet<String>>()
            .unwrap()
            .contains(&"x".to_string()));

        source.reset_delta();
        assert!(source.delta().is_none());
        // merging remote state does not produce a local delta
        assert!(replica_b.delta().is_none());
    }

    #[test]
    fn test_typed_access_is_checked() {
        let mut value = AnyStateBasedCrdt::new(GCounter::new());
        assert!(value.underlying::<ORSet<String>>().is_err());
        assert!(value.underlying_mut::<GCounter>().is_ok());

        let value = value.into_underlying::<ORSet<String>>().unwrap_err();
        assert_eq!(value.into_underlying::<GCounter>().unwrap().value(), 0);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = AnyStateBasedCrdt::new(counter("a", 1));
        let mut copy = original.clone();
        copy.underlying_mut::<GCounter>()
            .unwrap()
            .increment(&ReplicaId::from("a"), 1);

        assert_eq!(original.underlying::<GCounter>().unwrap().value(), 1);
        assert_eq!(copy.underlying::<GCounter>().unwrap().value(), 2);
    }
}
