//! Shared fixtures for receptionist integration tests

#![allow(dead_code)]

use mycelium_actors::{
    ActorAddress, ActorRef, ActorSystem, Behavior, DeadLetterRecorder, InMemoryNetwork,
};
use mycelium_config::RuntimeConfig;
use mycelium_receptionist::{Key, Listing, Receptionist};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Guest protocol registered in the tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Work {
    Job(u32),
}

pub fn work_key() -> Key<Work> {
    Key::new("workers")
}

pub fn config(gossip_interval_ms: u64, flush_on_change: bool) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.receptionist.gossip_interval_ms = gossip_interval_ms;
    config.receptionist.flush_on_change = flush_on_change;
    config.receptionist.full_sync_every_ticks = 5;
    config.ask.default_timeout_ms = 1_000;
    config
}

pub struct Node {
    pub system: ActorSystem,
    pub receptionist: Receptionist,
    pub dead_letters: std::sync::Arc<DeadLetterRecorder>,
}

pub fn node(id: &str, network: Option<&InMemoryNetwork>, config: &RuntimeConfig) -> Node {
    let dead_letters = DeadLetterRecorder::new();
    let mut builder = ActorSystem::builder()
        .config(&config.clone().with_node_id(id))
        .dead_letters(dead_letters.clone());
    if let Some(network) = network {
        builder = builder.network(network);
    }
    let system = builder.build().unwrap();
    let receptionist = Receptionist::spawn(&system, config).unwrap();
    Node {
        system,
        receptionist,
        dead_letters,
    }
}

pub fn worker(system: &ActorSystem, name: &str) -> ActorRef<Work> {
    system.spawn(Behavior::<Work>::ignore(), name).unwrap()
}

/// Actor forwarding every listing it receives, as sorted addresses
pub fn listing_watcher(
    system: &ActorSystem,
    name: &str,
) -> (ActorRef<Listing<Work>>, mpsc::UnboundedReceiver<Vec<ActorAddress>>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let watcher = system
        .spawn(
            Behavior::receive_message(move |listing: Listing<Work>| {
                let _ = sender.send(listing.addresses());
                Ok(Behavior::same())
            }),
            name,
        )
        .unwrap();
    (watcher, receiver)
}

pub async fn next_listing(
    receiver: &mut mpsc::UnboundedReceiver<Vec<ActorAddress>>,
) -> Vec<ActorAddress> {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("no listing within 2s")
        .expect("watcher stopped")
}

/// Poll `check` until it returns true or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn addresses(refs: &[&ActorRef<Work>]) -> Vec<ActorAddress> {
    let mut addresses: Vec<ActorAddress> = refs.iter().map(|r| r.address().clone()).collect();
    addresses.sort();
    addresses
}
