//! Single-node receptionist behavior: lookup, subscriptions, death-watch.

mod common;

use common::*;
use mycelium_receptionist::{Key, Listing, ReceptionistError};
use std::time::Duration;

#[tokio::test]
async fn test_lookup_of_unknown_key_is_empty() {
    let node = node("a", None, &config(50, true));
    let listing = node.receptionist.lookup(&work_key()).await.unwrap();
    assert!(listing.is_empty());
    assert_eq!(listing.key(), &work_key());
}

#[tokio::test]
async fn test_register_then_lookup() {
    let node = node("a", None, &config(50, true));
    let first = worker(&node.system, "first");
    let second = worker(&node.system, "second");

    let ack = node
        .receptionist
        .register_with_ack(&work_key(), &first)
        .await
        .unwrap();
    assert_eq!(ack.guest, *first.address());
    assert_eq!(&ack.key, work_key().id());
    node.receptionist.register(&work_key(), &second).unwrap();

    let listing = node.receptionist.lookup(&work_key()).await.unwrap();
    assert_eq!(listing.len(), 2);
    assert!(listing.contains(first.address()));
    assert_eq!(listing.addresses(), addresses(&[&first, &second]));

    // listed refs are live references to the guests
    let listed = listing.iter().find(|r| r.address() == first.address()).unwrap();
    assert!(listed.is_local());
    assert!(!listed.is_terminated());
}

#[tokio::test]
async fn test_keys_with_same_id_and_different_guest_types_are_separate() {
    let node = node("a", None, &config(50, true));
    let guest = worker(&node.system, "guest");
    node.receptionist.register(&work_key(), &guest).unwrap();

    let other: Key<String> = Key::new("workers");
    let listing = node.receptionist.lookup(&other).await.unwrap();
    assert!(listing.is_empty());
}

#[tokio::test]
async fn test_subscriber_sees_every_register_cumulatively() {
    let node = node("a", None, &config(50, true));
    let (watcher, mut listings) = listing_watcher(&node.system, "watcher");
    node.receptionist.subscribe(&work_key(), &watcher).unwrap();

    let first = worker(&node.system, "first");
    let second = worker(&node.system, "second");
    node.receptionist.register(&work_key(), &first).unwrap();
    node.receptionist.register(&work_key(), &second).unwrap();
    node.receptionist.register(&work_key(), &first).unwrap();

    assert!(next_listing(&mut listings).await.is_empty());
    assert_eq!(next_listing(&mut listings).await, addresses(&[&first]));
    assert_eq!(next_listing(&mut listings).await, addresses(&[&first, &second]));
    // a repeated register still notifies
    assert_eq!(next_listing(&mut listings).await, addresses(&[&first, &second]));
}

#[tokio::test]
async fn test_late_subscriber_starts_with_current_snapshot() {
    let node = node("a", None, &config(50, true));
    let guest = worker(&node.system, "guest");
    node.receptionist.register(&work_key(), &guest).unwrap();

    let (watcher, mut listings) = listing_watcher(&node.system, "watcher");
    node.receptionist.subscribe(&work_key(), &watcher).unwrap();
    assert_eq!(next_listing(&mut listings).await, addresses(&[&guest]));
}

#[tokio::test]
async fn test_deregister_removes_and_notifies() {
    let node = node("a", None, &config(50, true));
    let guest = worker(&node.system, "guest");
    let (watcher, mut listings) = listing_watcher(&node.system, "watcher");
    node.receptionist.subscribe(&work_key(), &watcher).unwrap();
    node.receptionist.register(&work_key(), &guest).unwrap();

    let removed = node
        .receptionist
        .deregister_with_ack(&work_key(), &guest)
        .await
        .unwrap();
    assert!(removed.removed);

    assert!(next_listing(&mut listings).await.is_empty());
    assert_eq!(next_listing(&mut listings).await, addresses(&[&guest]));
    assert!(next_listing(&mut listings).await.is_empty());

    let again = node
        .receptionist
        .deregister_with_ack(&work_key(), &guest)
        .await
        .unwrap();
    assert!(!again.removed);
}

#[tokio::test]
async fn test_stopped_guest_is_removed() {
    let node = node("a", None, &config(50, true));
    let guest = worker(&node.system, "guest");
    let survivor = worker(&node.system, "survivor");
    let (watcher, mut listings) = listing_watcher(&node.system, "watcher");
    node.receptionist.subscribe(&work_key(), &watcher).unwrap();
    node.receptionist.register(&work_key(), &guest).unwrap();
    node.receptionist.register(&work_key(), &survivor).unwrap();

    assert!(next_listing(&mut listings).await.is_empty());
    assert_eq!(next_listing(&mut listings).await.len(), 1);
    assert_eq!(next_listing(&mut listings).await.len(), 2);

    node.system.stop(&guest);
    assert_eq!(next_listing(&mut listings).await, addresses(&[&survivor]));

    let listing = node.receptionist.lookup(&work_key()).await.unwrap();
    assert_eq!(listing.addresses(), addresses(&[&survivor]));
}

#[tokio::test]
async fn test_stopped_subscriber_is_dropped() {
    let node = node("a", None, &config(50, true));
    let (watcher, mut listings) = listing_watcher(&node.system, "watcher");
    node.receptionist.subscribe(&work_key(), &watcher).unwrap();
    assert!(next_listing(&mut listings).await.is_empty());

    node.system.stop(&watcher);
    let closed = tokio::time::timeout(Duration::from_secs(2), listings.recv()).await;
    assert!(matches!(closed, Ok(None)));

    let guest = worker(&node.system, "guest");
    node.receptionist
        .register_with_ack(&work_key(), &guest)
        .await
        .unwrap();
    // nothing was sent to the stopped subscriber
    assert!(node.dead_letters.take_messages::<Listing<Work>>().is_empty());
}

#[tokio::test]
async fn test_operations_fail_once_receptionist_stopped() {
    let node = node("a", None, &config(50, true));
    node.system.stop(node.receptionist.actor_ref());
    let stopped = eventually(|| {
        let receptionist = node.receptionist.clone();
        async move { receptionist.actor_ref().is_terminated() }
    })
    .await;
    assert!(stopped);

    let error = node
        .receptionist
        .lookup_within(&work_key(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(error, ReceptionistError::NotRunning { .. }));

    let guest = worker(&node.system, "guest");
    assert!(node.receptionist.register(&work_key(), &guest).is_err());
}
