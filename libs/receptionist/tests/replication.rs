//! Cross-node replication between receptionists on an in-memory network.

mod common;

use common::*;
use mycelium_actors::{ActorAddress, InMemoryNetwork, NodeId};
use mycelium_receptionist::Receptionist;

async fn lookup_equals(receptionist: &Receptionist, expected: &[ActorAddress]) -> bool {
    match receptionist.lookup(&work_key()).await {
        Ok(listing) => listing.addresses() == expected,
        Err(_) => false,
    }
}

fn connect(a: &Node, b: &Node) {
    a.receptionist.peer_up(b.system.node_id().clone());
    b.receptionist.peer_up(a.system.node_id().clone());
}

#[tokio::test]
async fn test_two_replicas_converge() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);

    let g1 = worker(&a.system, "g1");
    let g2 = worker(&b.system, "g2");
    a.receptionist.register(&work_key(), &g1).unwrap();
    b.receptionist.register(&work_key(), &g2).unwrap();

    let expected = addresses(&[&g1, &g2]);
    assert!(eventually(|| lookup_equals(&a.receptionist, &expected)).await);
    assert!(eventually(|| lookup_equals(&b.receptionist, &expected)).await);

    // the remote entry is a reference that reaches the guest's node
    let listing = a.receptionist.lookup(&work_key()).await.unwrap();
    let remote = listing.iter().find(|r| r.address() == g2.address()).unwrap();
    assert!(!remote.is_local());
    remote.tell(Work::Job(1));
}

#[tokio::test]
async fn test_gossip_tick_replicates_without_flush_on_change() {
    let network = InMemoryNetwork::new();
    let config = config(20, false);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);

    let g1 = worker(&a.system, "g1");
    a.receptionist.register(&work_key(), &g1).unwrap();

    let expected = addresses(&[&g1]);
    assert!(eventually(|| lookup_equals(&b.receptionist, &expected)).await);
}

#[tokio::test]
async fn test_remote_subscriber_notified_on_merge() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);

    let (watcher, mut listings) = listing_watcher(&b.system, "watcher");
    b.receptionist.subscribe(&work_key(), &watcher).unwrap();
    assert!(next_listing(&mut listings).await.is_empty());

    let g1 = worker(&a.system, "g1");
    a.receptionist.register(&work_key(), &g1).unwrap();
    assert_eq!(next_listing(&mut listings).await, addresses(&[&g1]));
}

#[tokio::test]
async fn test_peer_up_pushes_existing_state() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);

    let g1 = worker(&a.system, "g1");
    a.receptionist
        .register_with_ack(&work_key(), &g1)
        .await
        .unwrap();
    // registered before b was a peer, so no delta reached it
    assert!(b.receptionist.lookup(&work_key()).await.unwrap().is_empty());

    a.receptionist.peer_up(NodeId::from("b"));
    let expected = addresses(&[&g1]);
    assert!(eventually(|| lookup_equals(&b.receptionist, &expected)).await);
}

#[tokio::test]
async fn test_partition_heals_through_retried_deltas() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);
    let (a_id, b_id) = (NodeId::from("a"), NodeId::from("b"));

    // let the initial (empty) exchange settle before cutting the link
    b.receptionist.lookup(&work_key()).await.unwrap();
    network.partition(&a_id, &b_id);

    let g1 = worker(&a.system, "g1");
    a.receptionist
        .register_with_ack(&work_key(), &g1)
        .await
        .unwrap();
    assert!(b.receptionist.lookup(&work_key()).await.unwrap().is_empty());

    network.heal(&a_id, &b_id);
    let expected = addresses(&[&g1]);
    assert!(eventually(|| lookup_equals(&b.receptionist, &expected)).await);
}

#[tokio::test]
async fn test_peer_down_hides_its_guests() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);

    let g1 = worker(&a.system, "g1");
    let g2 = worker(&b.system, "g2");
    a.receptionist.register(&work_key(), &g1).unwrap();
    b.receptionist.register(&work_key(), &g2).unwrap();
    let both = addresses(&[&g1, &g2]);
    assert!(eventually(|| lookup_equals(&a.receptionist, &both)).await);

    network.detach(&NodeId::from("b"));
    a.receptionist.peer_down(NodeId::from("b"));

    let only_local = addresses(&[&g1]);
    assert!(eventually(|| lookup_equals(&a.receptionist, &only_local)).await);
}

#[tokio::test]
async fn test_peer_down_then_up_keeps_live_guest() {
    let network = InMemoryNetwork::new();
    let config = config(20, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    connect(&a, &b);

    let g2 = worker(&b.system, "g2");
    b.receptionist.register(&work_key(), &g2).unwrap();
    let expected = addresses(&[&g2]);
    assert!(eventually(|| lookup_equals(&a.receptionist, &expected)).await);

    let (watcher, mut listings) = listing_watcher(&a.system, "watcher");
    a.receptionist.subscribe(&work_key(), &watcher).unwrap();
    assert_eq!(next_listing(&mut listings).await, expected);

    a.receptionist.peer_down(NodeId::from("b"));
    assert!(next_listing(&mut listings).await.is_empty());
    assert!(eventually(|| lookup_equals(&a.receptionist, &[])).await);

    a.receptionist.peer_up(NodeId::from("b"));
    assert_eq!(next_listing(&mut listings).await, expected);

    // several gossip rounds later neither side has lost the guest
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(lookup_equals(&a.receptionist, &expected).await);
    assert!(lookup_equals(&b.receptionist, &expected).await);
}

#[tokio::test]
async fn test_three_nodes_converge_through_anti_entropy() {
    let network = InMemoryNetwork::new();
    let config = config(10, true);
    let a = node("a", Some(&network), &config);
    let b = node("b", Some(&network), &config);
    let c = node("c", Some(&network), &config);
    // a line: a - b - c; c only learns a's guest through b's full state
    connect(&a, &b);
    connect(&b, &c);

    let g1 = worker(&a.system, "g1");
    let g3 = worker(&c.system, "g3");
    a.receptionist.register(&work_key(), &g1).unwrap();
    c.receptionist.register(&work_key(), &g3).unwrap();

    let expected = addresses(&[&g1, &g3]);
    assert!(eventually(|| lookup_equals(&a.receptionist, &expected)).await);
    assert!(eventually(|| lookup_equals(&b.receptionist, &expected)).await);
    assert!(eventually(|| lookup_equals(&c.receptionist, &expected)).await);
}
