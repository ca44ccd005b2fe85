//! Convergent Replicated State
//!
//! Type-erased merge engine over concrete replicated data types. Replication
//! code holds heterogeneous CRDTs behind [`AnyStateBasedCrdt`] /
//! [`AnyDeltaCrdt`]; the wrappers check a [`MetaType`] tag before dispatching
//! to the concrete join.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  AnyDeltaCrdt                │  delta(), try_merge_delta(), reset_delta()
//! │  ┌────────────────────────┐  │
//! │  │ AnyStateBasedCrdt      │  │  try_merge(), merge()
//! │  │  MetaType + dyn Any    │  │
//! │  └────────────────────────┘  │
//! └──────────────┬───────────────┘
//!                │ fn pointers monomorphised at construction
//!     ┌──────────┼─────────────┐
//!     ▼          ▼             ▼
//!   ORSet<T>   GCounter   LwwRegister<T>
//! ```
//!
//! # Examples
//!
//! ```rust
//! use mycelium_crdt::{AnyDeltaCrdt, ORSet, ReplicaId};
//!
//! let mut local = AnyDeltaCrdt::new(ORSet::<String>::new());
//! local
//!     .underlying_mut::<ORSet<String>>()?
//!     .add(&ReplicaId::from("node-a"), "service-1".to_string());
//!
//! let mut remote = AnyDeltaCrdt::new(ORSet::<String>::new());
//! if let Some(delta) = local.delta() {
//!     remote.try_merge_delta(&delta)?;
//!     local.reset_delta();
//! }
//! assert!(remote.underlying::<ORSet<String>>()?.contains(&"service-1".to_string()));
//! # Ok::<(), mycelium_crdt::CrdtError>(())
//! ```

pub mod erased;
pub mod error;
pub mod gcounter;
pub mod lww;
pub mod meta;
pub mod orset;
pub mod traits;

pub use erased::{AnyDelta, AnyDeltaCrdt, AnyStateBasedCrdt};
pub use error::{CrdtError, Result};
pub use gcounter::{GCounter, GCounterDelta};
pub use lww::LwwRegister;
pub use meta::MetaType;
pub use orset::{CausalContext, Dot, ORSet, ORSetDelta};
pub use traits::{DeltaCrdt, ReplicaId, StateBasedCrdt};
