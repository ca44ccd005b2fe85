//! Client handle for the node's receptionist.

use crate::error::{ReceptionistError, Result};
use crate::key::{Key, Listing};
use crate::protocol::{Deregistered, ListingSink, ReceptionistCommand, ReceptionistWire, Registered};
use crate::service::{receptionist, receptionist_on};
use mycelium_actors::{ActorRef, ActorSystem, NodeId, RemoteMessage};
use mycelium_config::{defaults, RuntimeConfig};
use std::time::Duration;
use tracing::debug;

/// Handle to the receptionist actor of one actor system.
///
/// Cheap to clone. Fire-and-forget operations return as soon as the command
/// is queued; `lookup` and the `*_with_ack` variants are asks bounded by the
/// configured ask timeout.
#[derive(Debug, Clone)]
pub struct Receptionist {
    system: ActorSystem,
    actor: ActorRef<ReceptionistCommand>,
    ask_timeout: Duration,
}

impl Receptionist {
    /// Spawn the receptionist under its well-known name and export it to peers
    pub fn spawn(system: &ActorSystem, config: &RuntimeConfig) -> Result<Self> {
        let actor = system.spawn(
            receptionist(config.receptionist.clone()),
            defaults::receptionist::ACTOR_NAME,
        )?;
        system.export_adapted::<ReceptionistWire, ReceptionistCommand>(
            &actor,
            ReceptionistCommand::from_wire,
        )?;
        debug!(receptionist = %actor.address(), "Receptionist exported");

        Ok(Self {
            system: system.clone(),
            actor,
            ask_timeout: Duration::from_millis(config.ask.default_timeout_ms),
        })
    }

    /// Override the timeout used by `lookup` and the acknowledged operations
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    pub fn actor_ref(&self) -> &ActorRef<ReceptionistCommand> {
        &self.actor
    }

    /// Register `guest` under `key`.
    ///
    /// A local guest is exported so peers can reach it through the listings
    /// they receive.
    pub fn register<G: RemoteMessage>(&self, key: &Key<G>, guest: &ActorRef<G>) -> Result<()> {
        self.ensure_running()?;
        self.export_guest(guest)?;
        self.actor.tell(ReceptionistCommand::Register {
            key: key.id().clone(),
            guest: guest.address().clone(),
            reply_to: None,
        });
        Ok(())
    }

    pub async fn register_with_ack<G: RemoteMessage>(
        &self,
        key: &Key<G>,
        guest: &ActorRef<G>,
    ) -> Result<Registered> {
        self.ensure_running()?;
        self.export_guest(guest)?;
        let key = key.id().clone();
        let guest = guest.address().clone();
        let registered = self
            .actor
            .ask(self.ask_timeout, |reply_to| ReceptionistCommand::Register {
                key,
                guest,
                reply_to: Some(reply_to),
            })
            .await?;
        Ok(registered)
    }

    pub fn deregister<G: RemoteMessage>(&self, key: &Key<G>, guest: &ActorRef<G>) -> Result<()> {
        self.ensure_running()?;
        self.actor.tell(ReceptionistCommand::Deregister {
            key: key.id().clone(),
            guest: guest.address().clone(),
            reply_to: None,
        });
        Ok(())
    }

    pub async fn deregister_with_ack<G: RemoteMessage>(
        &self,
        key: &Key<G>,
        guest: &ActorRef<G>,
    ) -> Result<Deregistered> {
        self.ensure_running()?;
        let key = key.id().clone();
        let guest = guest.address().clone();
        let deregistered = self
            .actor
            .ask(self.ask_timeout, |reply_to| ReceptionistCommand::Deregister {
                key,
                guest,
                reply_to: Some(reply_to),
            })
            .await?;
        Ok(deregistered)
    }

    /// Current listing of `key` on this node
    pub async fn lookup<G: RemoteMessage>(&self, key: &Key<G>) -> Result<Listing<G>> {
        self.lookup_within(key, self.ask_timeout).await
    }

    pub async fn lookup_within<G: RemoteMessage>(
        &self,
        key: &Key<G>,
        timeout: Duration,
    ) -> Result<Listing<G>> {
        self.ensure_running()?;
        let key_id = key.id().clone();
        let key = key.clone();
        let listing = self
            .actor
            .ask(timeout, move |reply_to| ReceptionistCommand::Lookup {
                key: key_id,
                reply_to: ListingSink::new(key, reply_to),
            })
            .await?;
        Ok(listing)
    }

    /// Send `subscriber` the current listing of `key` and every later change
    pub fn subscribe<G: RemoteMessage>(
        &self,
        key: &Key<G>,
        subscriber: &ActorRef<Listing<G>>,
    ) -> Result<()> {
        self.ensure_running()?;
        self.actor.tell(ReceptionistCommand::Subscribe {
            key: key.id().clone(),
            subscriber: ListingSink::new(key.clone(), subscriber.clone()),
        });
        Ok(())
    }

    /// Start replicating with the receptionist on `node`
    pub fn peer_up(&self, node: NodeId) {
        self.actor.tell(ReceptionistCommand::PeerUp(node));
    }

    /// The receptionist of another node.
    ///
    /// Listings it sends for `Lookup` or `Subscribe` arrive as
    /// [`RemoteListing`](crate::protocol::RemoteListing) at an exported actor.
    pub fn remote(&self, node: &NodeId) -> ActorRef<ReceptionistWire> {
        receptionist_on(&self.system, node)
    }

    /// Stop replicating with `node` and hide the guests it hosted
    pub fn peer_down(&self, node: NodeId) {
        self.actor.tell(ReceptionistCommand::PeerDown(node));
    }

    fn ensure_running(&self) -> Result<()> {
        if self.actor.is_terminated() {
            return Err(ReceptionistError::NotRunning {
                node: self.system.node_id().to_string(),
            });
        }
        Ok(())
    }

    fn export_guest<G: RemoteMessage>(&self, guest: &ActorRef<G>) -> Result<()> {
        if guest.address().is_local_to(self.system.node_id()) && !guest.is_terminated() {
            self.system.export(guest)?;
        }
        Ok(())
    }
}
