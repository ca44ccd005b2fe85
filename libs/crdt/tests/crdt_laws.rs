//! CRDT Merge Law Property Tests
//!
//! These tests validate the join-semilattice properties that must hold for
//! every replicated type behind the erased wrappers, regardless of the
//! operation history that produced the replicas.

use mycelium_crdt::{
    AnyDeltaCrdt, AnyStateBasedCrdt, DeltaCrdt, GCounter, ORSet, ORSetDelta, ReplicaId,
    StateBasedCrdt,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum SetOp {
    Add(u8),
    Remove(u8),
    /// Merge the state of another replica (index into the replica list)
    Sync(usize),
}

const REPLICAS: usize = 3;

fn set_op() -> impl Strategy<Value = (usize, SetOp)> {
    (
        0..REPLICAS,
        prop_oneof![
            4 => (0u8..8).prop_map(SetOp::Add),
            2 => (0u8..8).prop_map(SetOp::Remove),
            1 => (0..REPLICAS).prop_map(SetOp::Sync),
        ],
    )
}

fn replica_id(index: usize) -> ReplicaId {
    ReplicaId::new(format!("replica-{}", index))
}

/// Replay an interleaved history over three replicas
fn build_sets(history: &[(usize, SetOp)]) -> Vec<ORSet<u8>> {
    let mut replicas: Vec<ORSet<u8>> = (0..REPLICAS).map(|_| ORSet::new()).collect();
    for (index, op) in history {
        match op {
            SetOp::Add(element) => replicas[*index].add(&replica_id(*index), *element),
            SetOp::Remove(element) => {
                replicas[*index].remove(element);
            }
            SetOp::Sync(from) => {
                let source = replicas[*from].clone();
                replicas[*index].merge(&source);
            }
        }
    }
    replicas
}

fn build_counters(history: &[(usize, u64)]) -> Vec<GCounter> {
    let mut replicas: Vec<GCounter> = (0..REPLICAS).map(|_| GCounter::new()).collect();
    for (index, by) in history {
        replicas[*index].increment(&replica_id(*index), *by);
    }
    replicas
}

fn erased_merge(a: &AnyStateBasedCrdt, b: &AnyStateBasedCrdt) -> AnyStateBasedCrdt {
    let mut merged = a.clone();
    merged.try_merge(b).expect("same concrete type");
    merged
}

fn as_set(value: &AnyStateBasedCrdt) -> &ORSet<u8> {
    value.underlying::<ORSet<u8>>().expect("ORSet<u8>")
}

proptest! {
    #[test]
    fn prop_orset_merge_is_commutative(history in prop::collection::vec(set_op(), 0..40)) {
        let sets = build_sets(&history);
        let a = AnyStateBasedCrdt::new(sets[0].clone());
        let b = AnyStateBasedCrdt::new(sets[1].clone());

        let ab = erased_merge(&a, &b);
        let ba = erased_merge(&b, &a);
        prop_assert_eq!(as_set(&ab), as_set(&ba));
    }

    #[test]
    fn prop_orset_merge_is_associative(history in prop::collection::vec(set_op(), 0..40)) {
        let sets = build_sets(&history);
        let a = AnyStateBasedCrdt::new(sets[0].clone());
        let b = AnyStateBasedCrdt::new(sets[1].clone());
        let c = AnyStateBasedCrdt::new(sets[2].clone());

        let left = erased_merge(&erased_merge(&a, &b), &c);
        let right = erased_merge(&a, &erased_merge(&b, &c));
        prop_assert_eq!(as_set(&left), as_set(&right));
    }

    #[test]
    fn prop_orset_merge_is_idempotent(history in prop::collection::vec(set_op(), 0..40)) {
        let sets = build_sets(&history);
        let a = AnyStateBasedCrdt::new(sets[0].clone());

        let aa = erased_merge(&a, &a);
        prop_assert_eq!(as_set(&aa), as_set(&a));
    }

    #[test]
    fn prop_gcounter_laws(history in prop::collection::vec((0..REPLICAS, 1u64..100), 0..30)) {
        let counters = build_counters(&history);
        let a = AnyStateBasedCrdt::new(counters[0].clone());
        let b = AnyStateBasedCrdt::new(counters[1].clone());
        let c = AnyStateBasedCrdt::new(counters[2].clone());
        let value = |v: &AnyStateBasedCrdt| v.underlying::<GCounter>().expect("GCounter").clone();

        prop_assert_eq!(value(&erased_merge(&a, &b)), value(&erased_merge(&b, &a)));
        prop_assert_eq!(
            value(&erased_merge(&erased_merge(&a, &b), &c)),
            value(&erased_merge(&a, &erased_merge(&b, &c)))
        );
        prop_assert_eq!(value(&erased_merge(&a, &a)), value(&a));

        let total: u64 = history.iter().map(|(_, by)| *by).sum();
        prop_assert_eq!(value(&erased_merge(&erased_merge(&a, &b), &c)).value(), total);
    }

    #[test]
    fn prop_delta_equivalence(ops in prop::collection::vec(
        prop_oneof![(0u8..8).prop_map(SetOp::Add), (0u8..8).prop_map(SetOp::Remove)],
        1..40,
    )) {
        let me = replica_id(0);
        let mut source = AnyDeltaCrdt::new(ORSet::<u8>::new());
        let mut deltas = Vec::new();

        for op in &ops {
            let set = source.underlying_mut::<ORSet<u8>>().expect("ORSet<u8>");
            match op {
                SetOp::Add(element) => set.add(&me, *element),
                SetOp::Remove(element) => {
                    set.remove(element);
                }
                SetOp::Sync(_) => unreachable!("not generated"),
            }
            if let Some(delta) = source.delta() {
                deltas.push(delta);
                source.reset_delta();
            }
        }

        let mut from_deltas = AnyDeltaCrdt::new(ORSet::<u8>::new());
        for delta in &deltas {
            from_deltas.try_merge_delta(delta).expect("same delta type");
        }

        let mut from_state = AnyDeltaCrdt::new(ORSet::<u8>::new());
        from_state.try_merge(source.as_state()).expect("same state type");

        prop_assert_eq!(
            from_deltas.underlying::<ORSet<u8>>().expect("ORSet<u8>"),
            from_state.underlying::<ORSet<u8>>().expect("ORSet<u8>")
        );
        prop_assert_eq!(
            from_state.underlying::<ORSet<u8>>().expect("ORSet<u8>"),
            source.underlying::<ORSet<u8>>().expect("ORSet<u8>")
        );
    }
}

#[test]
fn test_mismatched_erased_merge_is_reported_not_applied() {
    let mut set = AnyStateBasedCrdt::new(ORSet::<u8>::new());
    let mut counter = GCounter::new();
    counter.increment(&replica_id(0), 7);
    let counter = AnyStateBasedCrdt::new(counter);

    assert!(set.try_merge(&counter).is_err());
    assert!(as_set(&set).is_empty());
    assert_eq!(counter.underlying::<GCounter>().unwrap().value(), 7);
}

#[test]
fn test_delta_survives_the_wire() {
    let me = replica_id(0);
    let mut source = ORSet::new();
    source.add(&me, 1u8);
    source.add(&me, 2u8);
    source.remove(&1u8);

    let bytes = bincode::serialize(source.delta().unwrap()).unwrap();
    let delta: ORSetDelta<u8> = bincode::deserialize(&bytes).unwrap();

    let mut target = ORSet::new();
    target.merge_delta(&delta);
    assert_eq!(target, source);
}
