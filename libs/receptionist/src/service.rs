//! The receptionist actor.
//!
//! All registry state lives inside one actor per node and is only touched
//! by its own sequential message handling. Peer deltas arrive as ordinary
//! `Replicate` commands through the mailbox.

use crate::error::Result;
use crate::key::KeyId;
use crate::protocol::{
    Deregistered, ListingSink, ReceptionistCommand, ReceptionistWire, Registered,
    ReplicationMessage, ReplicationPayload,
};
use crate::store::RegistryStore;
use mycelium_actors::{
    ActorAddress, ActorContext, ActorFault, ActorRef, ActorSystem, Behavior, NodeId,
};
use mycelium_config::defaults;
use mycelium_config::ReceptionistSettings;
use mycelium_crdt::ReplicaId;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Receptionist behavior; starts its gossip timer on setup
pub fn receptionist(settings: ReceptionistSettings) -> Behavior<ReceptionistCommand> {
    Behavior::<ReceptionistCommand>::setup(move |ctx| {
        let node = ctx.system().node_id().clone();
        // fresh per incarnation so a restarted node never reuses dots
        let replica = ReplicaId::new(format!("{}-{}", node, Uuid::new_v4().simple()));
        let interval = Duration::from_millis(settings.gossip_interval_ms.max(1));
        ctx.schedule_repeatedly(interval, interval, || ReceptionistCommand::Tick);

        info!(
            node = %node,
            replica = %replica,
            gossip_interval_ms = settings.gossip_interval_ms,
            "Receptionist started"
        );

        let mut state = ReceptionistState::new(node, replica, settings);
        Ok(Behavior::receive(
            move |ctx: &mut ActorContext<ReceptionistCommand>, command: ReceptionistCommand| {
                trace!(command = command.kind(), "Receptionist command");
                state.handle(ctx, command).map_err(ActorFault::failed)?;
                Ok(Behavior::same())
            },
        ))
    })
}

struct ReceptionistState {
    node: NodeId,
    settings: ReceptionistSettings,
    store: RegistryStore,
    subscribers: HashMap<KeyId, Vec<ListingSink>>,
    peers: BTreeSet<NodeId>,
    // members on these nodes are hidden from listings, never removed
    down_peers: BTreeSet<NodeId>,
    watched_guests: HashSet<ActorAddress>,
    ticks: u64,
}

impl ReceptionistState {
    fn new(node: NodeId, replica: ReplicaId, settings: ReceptionistSettings) -> Self {
        Self {
            node,
            settings,
            store: RegistryStore::new(replica),
            subscribers: HashMap::new(),
            peers: BTreeSet::new(),
            down_peers: BTreeSet::new(),
            watched_guests: HashSet::new(),
            ticks: 0,
        }
    }

    fn handle(
        &mut self,
        ctx: &mut ActorContext<ReceptionistCommand>,
        command: ReceptionistCommand,
    ) -> Result<()> {
        match command {
            ReceptionistCommand::Register {
                key,
                guest,
                reply_to,
            } => self.register(ctx, key, guest, reply_to),
            ReceptionistCommand::Deregister {
                key,
                guest,
                reply_to,
            } => self.deregister(ctx.system(), key, guest, reply_to),
            ReceptionistCommand::Lookup { key, reply_to } => {
                let members = self.visible_members(&key)?;
                reply_to.deliver(ctx.system(), &members);
                Ok(())
            }
            ReceptionistCommand::Subscribe { key, subscriber } => {
                self.subscribe(ctx, key, subscriber)
            }
            ReceptionistCommand::PeerUp(peer) => self.peer_up(ctx.system(), peer),
            ReceptionistCommand::PeerDown(peer) => self.peer_down(ctx.system(), peer),
            ReceptionistCommand::Replicate(message) => {
                self.replicate(ctx.system(), message);
                Ok(())
            }
            ReceptionistCommand::Tick => self.tick(ctx.system()),
            ReceptionistCommand::GuestTerminated(guest) => {
                self.watched_guests.remove(&guest);
                let changed = self.store.remove_where(|member| *member == guest)?;
                if !changed.is_empty() {
                    debug!(guest = %guest, keys = changed.len(), "Removed terminated guest");
                    self.notify_all(ctx.system(), &changed)?;
                    self.local_change(ctx.system())?;
                }
                Ok(())
            }
            ReceptionistCommand::SubscriberTerminated { key, subscriber } => {
                if let Some(sinks) = self.subscribers.get_mut(&key) {
                    sinks.retain(|sink| *sink.address() != subscriber);
                    if sinks.is_empty() {
                        self.subscribers.remove(&key);
                    }
                }
                Ok(())
            }
        }
    }

    fn register(
        &mut self,
        ctx: &mut ActorContext<ReceptionistCommand>,
        key: KeyId,
        guest: ActorAddress,
        reply_to: Option<ActorRef<Registered>>,
    ) -> Result<()> {
        self.store.add(&key, guest.clone())?;
        debug!(key = %key, guest = %guest, "Guest registered");

        if guest.is_local_to(&self.node) && self.watched_guests.insert(guest.clone()) {
            let me = ctx.self_ref().clone();
            let terminated = guest.clone();
            ctx.system().watch(&guest, move || {
                me.tell(ReceptionistCommand::GuestTerminated(terminated))
            });
        }

        if let Some(reply_to) = reply_to {
            reply_to.tell(Registered {
                key: key.clone(),
                guest,
            });
        }

        // every register notifies, repeated ones included
        self.notify(ctx.system(), &key)?;
        self.local_change(ctx.system())
    }

    fn deregister(
        &mut self,
        system: &ActorSystem,
        key: KeyId,
        guest: ActorAddress,
        reply_to: Option<ActorRef<Deregistered>>,
    ) -> Result<()> {
        let removed = self.store.remove(&key, &guest)?;
        debug!(key = %key, guest = %guest, removed, "Guest deregistered");

        if let Some(reply_to) = reply_to {
            reply_to.tell(Deregistered {
                key: key.clone(),
                guest,
                removed,
            });
        }

        if removed {
            self.notify(system, &key)?;
            self.local_change(system)?;
        }
        Ok(())
    }

    fn subscribe(
        &mut self,
        ctx: &mut ActorContext<ReceptionistCommand>,
        key: KeyId,
        subscriber: ListingSink,
    ) -> Result<()> {
        let members = self.visible_members(&key)?;
        if !subscriber.deliver(ctx.system(), &members) {
            debug!(key = %key, subscriber = %subscriber.address(), "Subscriber already stopped");
            return Ok(());
        }

        let me = ctx.self_ref().clone();
        let watched = subscriber.address().clone();
        let watched_key = key.clone();
        ctx.system().watch(subscriber.address(), move || {
            me.tell(ReceptionistCommand::SubscriberTerminated {
                key: watched_key,
                subscriber: watched,
            })
        });

        debug!(key = %key, subscriber = %subscriber.address(), "Subscriber added");
        self.subscribers.entry(key).or_default().push(subscriber);
        Ok(())
    }

    fn peer_up(&mut self, system: &ActorSystem, peer: NodeId) -> Result<()> {
        if peer == self.node || !self.peers.insert(peer.clone()) {
            return Ok(());
        }
        info!(peer = %peer, peers = self.peers.len(), "Peer receptionist up");
        if self.down_peers.remove(&peer) {
            let revealed = self.store.keys_where(|member| member.node == peer)?;
            self.notify_all(system, &revealed)?;
        }
        self.push_full_state(system, std::slice::from_ref(&peer))
    }

    /// Hide the peer's guests locally. The owning node stays authoritative
    /// for them, so nothing is removed from the replicated sets.
    fn peer_down(&mut self, system: &ActorSystem, peer: NodeId) -> Result<()> {
        if !self.peers.remove(&peer) {
            return Ok(());
        }
        self.down_peers.insert(peer.clone());
        let hidden = self.store.keys_where(|member| member.node == peer)?;
        info!(
            peer = %peer,
            hidden_keys = hidden.len(),
            "Peer receptionist down"
        );
        self.notify_all(system, &hidden)
    }

    fn replicate(&mut self, system: &ActorSystem, message: ReplicationMessage) {
        if message.from == self.node {
            return;
        }
        if !self.peers.contains(&message.from) {
            debug!(from = %message.from, "Replication from a node not known as a peer");
        }

        let keys = message.key_count();
        let merged = match &message.payload {
            ReplicationPayload::Deltas(deltas) => self.store.merge_deltas(deltas),
            ReplicationPayload::FullState(states) => self.store.merge_states(states),
        };
        let changed = match merged {
            Ok(changed) => changed,
            Err(e) => {
                warn!(
                    from = %message.from,
                    replica = %message.replica,
                    error = %e,
                    "Rejected replication payload"
                );
                return;
            }
        };

        trace!(from = %message.from, keys, changed = changed.len(), "Merged replication payload");
        if let Err(e) = self.notify_all(system, &changed) {
            warn!(error = %e, "Failed to notify subscribers after merge");
        }
    }

    fn tick(&mut self, system: &ActorSystem) -> Result<()> {
        self.ticks += 1;
        self.flush_deltas(system)?;

        let every = u64::from(self.settings.full_sync_every_ticks);
        if every > 0 && self.ticks % every == 0 {
            let peers: Vec<NodeId> = self.peers.iter().cloned().collect();
            self.push_full_state(system, &peers)?;
        }
        Ok(())
    }

    fn local_change(&mut self, system: &ActorSystem) -> Result<()> {
        if self.settings.flush_on_change {
            self.flush_deltas(system)?;
        }
        Ok(())
    }

    /// Hand pending deltas to every peer; reset them only if all accepted
    fn flush_deltas(&mut self, system: &ActorSystem) -> Result<()> {
        let deltas = self.store.pending_deltas()?;
        if deltas.is_empty() {
            return Ok(());
        }

        let mut accepted = true;
        for peer in &self.peers {
            let message = ReplicationMessage {
                from: self.node.clone(),
                replica: self.store.replica().clone(),
                payload: ReplicationPayload::Deltas(deltas.clone()),
            };
            let wire = ReceptionistWire::Replicate(message);
            if let Err(undelivered) = receptionist_on(system, peer).try_tell(wire) {
                warn!(
                    peer = %peer,
                    reason = %undelivered.reason,
                    "Delta not accepted by transport, retrying next tick"
                );
                accepted = false;
            }
        }

        // with no peers the reset is safe: peer_up pushes full state
        if accepted {
            trace!(keys = deltas.len(), peers = self.peers.len(), "Deltas flushed");
            self.store.reset_deltas();
        }
        Ok(())
    }

    fn push_full_state(&self, system: &ActorSystem, peers: &[NodeId]) -> Result<()> {
        if peers.is_empty() {
            return Ok(());
        }
        let states = self.store.full_state()?;
        if states.is_empty() {
            return Ok(());
        }

        for peer in peers {
            let message = ReplicationMessage {
                from: self.node.clone(),
                replica: self.store.replica().clone(),
                payload: ReplicationPayload::FullState(states.clone()),
            };
            let wire = ReceptionistWire::Replicate(message);
            if let Err(undelivered) = receptionist_on(system, peer).try_tell(wire) {
                warn!(peer = %peer, reason = %undelivered.reason, "Full state not delivered");
            }
        }
        Ok(())
    }

    /// Replicated members of `key` minus those on nodes currently down
    fn visible_members(&self, key: &KeyId) -> Result<BTreeSet<ActorAddress>> {
        let mut members = self.store.members(key)?;
        if !self.down_peers.is_empty() {
            members.retain(|member| !self.down_peers.contains(&member.node));
        }
        Ok(members)
    }

    fn notify_all(&mut self, system: &ActorSystem, keys: &[KeyId]) -> Result<()> {
        for key in keys {
            self.notify(system, key)?;
        }
        Ok(())
    }

    /// Send the current listing of `key` to its subscribers, dropping stopped ones
    fn notify(&mut self, system: &ActorSystem, key: &KeyId) -> Result<()> {
        if !self.subscribers.contains_key(key) {
            return Ok(());
        }
        let members = self.visible_members(key)?;
        let Some(sinks) = self.subscribers.get_mut(key) else {
            return Ok(());
        };
        sinks.retain(|sink| sink.deliver(system, &members));
        if sinks.is_empty() {
            self.subscribers.remove(key);
        }
        Ok(())
    }
}

/// The receptionist of `node`, reached through its wire form
pub fn receptionist_on(system: &ActorSystem, node: &NodeId) -> ActorRef<ReceptionistWire> {
    let address = ActorAddress::new(node.clone(), defaults::receptionist::ACTOR_NAME);
    system.resolve::<ReceptionistWire>(&address)
}
