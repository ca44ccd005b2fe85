//! Actor System Core
//!
//! Owns every local actor of one node: spawns their dispatchers, tracks them
//! by path, resolves addresses into references, routes inbound wire traffic
//! to exported actors, and fires death-watch callbacks when actors stop.
//!
//! # Lock Ordering
//!
//! `registry` is never held while calling into user code (watch callbacks,
//! decoders) and never held together with `exports`.

use crate::actor_ref::{ActorRef, RemoteEndpoint};
use crate::address::{ActorAddress, NodeId};
use crate::behavior::Behavior;
use crate::dead_letter::{
    DeadLetter, DeadLetterReason, DeadLetterSink, DeadLetters, LoggingDeadLetterSink,
};
use crate::dispatcher::{ActorCell, Incarnation};
use crate::error::{ActorError, Result};
use crate::mailbox::{Mailbox, Signal};
use crate::messages::{Message, RemoteMessage, WireEnvelope};
use crate::metrics::{SystemMetrics, SystemStats};
use crate::naming::{NameGenerator, GENERATED_PREFIX};
use crate::supervision::{supervisor_from_settings, StopSupervisor, Supervisor};
use crate::transport::{InMemoryNetwork, Transport};
use bytes::Bytes;
use mycelium_config::{defaults, RuntimeConfig};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

type Watcher = Box<dyn FnOnce() + Send>;
type InboundDecoder = Arc<dyn Fn(&WireEnvelope) -> Result<()> + Send + Sync>;

struct ActorEntry {
    /// The actor's `ActorRef<M>`, recovered by downcast in `resolve_local`
    reference: Box<dyn Any + Send + Sync>,
    signals: mpsc::UnboundedSender<Signal>,
}

#[derive(Default)]
struct Registry {
    actors: HashMap<String, ActorEntry>,
    watchers: HashMap<String, Vec<Watcher>>,
}

struct SystemInner {
    node: NodeId,
    runtime: Handle,
    throughput: usize,
    registry: Mutex<Registry>,
    exports: RwLock<HashMap<String, InboundDecoder>>,
    transport: Option<Arc<dyn Transport>>,
    dead_letters: DeadLetters,
    supervisor: Arc<dyn Supervisor>,
    names: NameGenerator,
    metrics: Arc<SystemMetrics>,
    shutting_down: AtomicBool,
    idle: Notify,
}

/// Handle to one node's actor runtime; cheap to clone
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

/// Builder for [`ActorSystem`]
#[derive(Default)]
pub struct ActorSystemBuilder {
    node: Option<NodeId>,
    throughput: Option<usize>,
    supervisor: Option<Arc<dyn Supervisor>>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    transport: Option<Arc<dyn Transport>>,
    network: Option<InMemoryNetwork>,
    names: Option<NameGenerator>,
}

impl ActorSystemBuilder {
    pub fn node_id(mut self, node: impl Into<String>) -> Self {
        self.node = Some(NodeId::new(node));
        self
    }

    /// Take node id, dispatcher throughput and supervision from configuration
    pub fn config(mut self, config: &RuntimeConfig) -> Self {
        self.node = Some(NodeId::new(config.node.node_id.clone()));
        self.throughput = Some(config.dispatcher.throughput);
        self.supervisor = Some(supervisor_from_settings(&config.supervision));
        self
    }

    pub fn throughput(mut self, throughput: usize) -> Self {
        self.throughput = Some(throughput);
        self
    }

    pub fn supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Send through `network` and attach the built system to it
    pub fn network(mut self, network: &InMemoryNetwork) -> Self {
        self.network = Some(network.clone());
        self
    }

    pub fn name_generator(mut self, names: NameGenerator) -> Self {
        self.names = Some(names);
        self
    }

    /// Build the system; must run inside a tokio runtime
    pub fn build(self) -> Result<ActorSystem> {
        let runtime = Handle::try_current().map_err(|e| ActorError::Runtime(e.to_string()))?;
        let node = self
            .node
            .unwrap_or_else(|| NodeId::new(defaults::node::NODE_ID));
        let metrics = Arc::new(SystemMetrics::default());
        let sink = self
            .dead_letters
            .unwrap_or_else(|| Arc::new(LoggingDeadLetterSink::default()) as Arc<dyn DeadLetterSink>);
        let transport = match (&self.network, self.transport) {
            (Some(network), _) => Some(network.transport(node.clone())),
            (None, transport) => transport,
        };

        let system = ActorSystem {
            inner: Arc::new(SystemInner {
                node,
                runtime,
                throughput: self
                    .throughput
                    .unwrap_or(defaults::dispatcher::THROUGHPUT)
                    .max(1),
                registry: Mutex::new(Registry::default()),
                exports: RwLock::new(HashMap::new()),
                transport,
                dead_letters: DeadLetters::new(sink, metrics.clone()),
                supervisor: self
                    .supervisor
                    .unwrap_or_else(|| Arc::new(StopSupervisor) as Arc<dyn Supervisor>),
                names: self.names.unwrap_or_default(),
                metrics,
                shutting_down: AtomicBool::new(false),
                idle: Notify::new(),
            }),
        };

        if let Some(network) = &self.network {
            network.attach(&system);
        }

        info!(
            node = %system.inner.node,
            throughput = system.inner.throughput,
            remote = system.inner.transport.is_some(),
            "Actor system started"
        );
        Ok(system)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ActorError::invalid_name(name, "name is empty"));
    }
    if name.contains('/') {
        return Err(ActorError::invalid_name(name, "name contains '/'"));
    }
    if name.starts_with(GENERATED_PREFIX) {
        return Err(ActorError::invalid_name(name, "'$' prefix is reserved"));
    }
    Ok(())
}

impl ActorSystem {
    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::default()
    }

    pub fn node_id(&self) -> &NodeId {
        &self.inner.node
    }

    /// Spawn a top-level actor under `name`
    pub fn spawn<M: Message>(&self, behavior: Behavior<M>, name: &str) -> Result<ActorRef<M>> {
        validate_name(name)?;
        self.spawn_once_at(self.top_level(name), behavior)
    }

    /// Spawn a top-level actor under a generated `$` name
    pub fn spawn_anonymous<M: Message>(&self, behavior: Behavior<M>) -> Result<ActorRef<M>> {
        let name = self.next_name();
        self.spawn_once_at(self.top_level(&name), behavior)
    }

    /// Spawn an actor the supervisor may restart with a fresh `factory()`
    pub fn spawn_restartable<M, F>(&self, factory: F, name: &str) -> Result<ActorRef<M>>
    where
        M: Message,
        F: Fn() -> Behavior<M> + Send + 'static,
    {
        validate_name(name)?;
        self.spawn_at(self.top_level(name), Incarnation::Factory(Box::new(factory)))
    }

    pub(crate) fn spawn_once_at<M: Message>(
        &self,
        address: ActorAddress,
        behavior: Behavior<M>,
    ) -> Result<ActorRef<M>> {
        self.spawn_at(address, Incarnation::Once(Some(behavior)))
    }

    fn spawn_at<M: Message>(
        &self,
        address: ActorAddress,
        incarnation: Incarnation<M>,
    ) -> Result<ActorRef<M>> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(ActorError::ShuttingDown);
        }

        let (mailbox, receiver) = Mailbox::new();
        let signals = mailbox.signal_sender();
        let reference = ActorRef::local(address.clone(), mailbox, self.inner.dead_letters.clone());

        {
            let mut registry = self.inner.registry.lock();
            if registry.actors.contains_key(&address.path) {
                return Err(ActorError::NameTaken { path: address.path });
            }
            registry.actors.insert(
                address.path.clone(),
                ActorEntry {
                    reference: Box::new(reference.clone()),
                    signals,
                },
            );
        }

        let cell = ActorCell::new(reference.clone(), receiver, incarnation, self.clone());
        self.inner.runtime.spawn(cell.run());
        self.inner.metrics.record_spawned();

        debug!(
            actor = %address,
            message_type = std::any::type_name::<M>(),
            "Actor spawned"
        );
        Ok(reference)
    }

    /// Ask an actor to stop; queued messages become dead letters.
    ///
    /// Returns false when no such local actor is running.
    pub fn stop<M: Message>(&self, actor: &ActorRef<M>) -> bool {
        self.stop_address(actor.address())
    }

    pub fn stop_address(&self, address: &ActorAddress) -> bool {
        if !address.is_local_to(&self.inner.node) {
            return false;
        }
        let signals = self
            .inner
            .registry
            .lock()
            .actors
            .get(&address.path)
            .map(|entry| entry.signals.clone());
        match signals {
            Some(signals) => signals.send(Signal::Stop).is_ok(),
            None => false,
        }
    }

    pub fn is_alive(&self, address: &ActorAddress) -> bool {
        address.is_local_to(&self.inner.node)
            && self.inner.registry.lock().actors.contains_key(&address.path)
    }

    pub fn actor_count(&self) -> usize {
        self.inner.registry.lock().actors.len()
    }

    /// Reference to a running local actor accepting `M`
    pub fn resolve_local<M: Message>(&self, address: &ActorAddress) -> Option<ActorRef<M>> {
        if !address.is_local_to(&self.inner.node) {
            return None;
        }
        self.inner
            .registry
            .lock()
            .actors
            .get(&address.path)
            .and_then(|entry| entry.reference.downcast_ref::<ActorRef<M>>())
            .cloned()
    }

    /// Turn an address from anywhere in the cluster into a reference.
    ///
    /// Never fails: an address that cannot be reached yields a reference
    /// whose messages go to dead letters.
    pub fn resolve<M: RemoteMessage>(&self, address: &ActorAddress) -> ActorRef<M> {
        if address.is_local_to(&self.inner.node) {
            return match self.resolve_local(address) {
                Some(reference) => reference,
                None => self.dead_ref(address.clone()),
            };
        }

        match &self.inner.transport {
            Some(transport) => ActorRef::remote(
                address.clone(),
                RemoteEndpoint {
                    transport: transport.clone(),
                    local_node: self.inner.node.clone(),
                    encode: WireEnvelope::wrap::<M>,
                },
                self.inner.dead_letters.clone(),
            ),
            None => ActorRef::dead(
                address.clone(),
                DeadLetterReason::Unreachable("no transport configured".to_string()),
                self.inner.dead_letters.clone(),
            ),
        }
    }

    /// Accept remote messages of type `M` for `actor`
    pub fn export<M: RemoteMessage>(&self, actor: &ActorRef<M>) -> Result<()> {
        self.export_adapted::<M, M>(actor, |message| message)
    }

    /// Accept remote messages of wire type `W`, converted by `adapt`.
    ///
    /// The first export of an actor wins; exports end when the actor stops.
    pub fn export_adapted<W, M>(&self, actor: &ActorRef<M>, adapt: fn(W) -> M) -> Result<()>
    where
        W: RemoteMessage,
        M: Message,
    {
        let address = actor.address();
        if !address.is_local_to(&self.inner.node) {
            return Err(ActorError::NotLocal {
                address: address.clone(),
                node: self.inner.node.clone(),
            });
        }
        if actor.is_terminated() {
            return Err(ActorError::NotExported {
                address: address.clone(),
            });
        }

        let target = actor.clone();
        let decoder: InboundDecoder = Arc::new(move |envelope: &WireEnvelope| {
            let wire: W = envelope.open()?;
            target.tell(adapt(wire));
            Ok(())
        });
        self.inner
            .exports
            .write()
            .entry(address.path.clone())
            .or_insert(decoder);

        debug!(actor = %address, wire_type = std::any::type_name::<W>(), "Actor exported");
        Ok(())
    }

    /// Route bytes received from the transport to an exported actor
    pub fn deliver_inbound(&self, bytes: Bytes) -> Result<()> {
        let envelope = WireEnvelope::decode(&bytes)?;
        if !envelope.recipient.is_local_to(&self.inner.node) {
            return Err(ActorError::NotLocal {
                address: envelope.recipient,
                node: self.inner.node.clone(),
            });
        }

        let decoder = self.inner.exports.read().get(&envelope.recipient.path).cloned();
        match decoder {
            Some(decoder) => decoder(&envelope),
            None => {
                warn!(
                    recipient = %envelope.recipient,
                    sender_node = %envelope.sender_node,
                    "Inbound message for an actor that is not exported"
                );
                self.inner.dead_letters.publish_letter(DeadLetter {
                    recipient: envelope.recipient.clone(),
                    message_type: Cow::Owned(envelope.message_type.clone()),
                    message: Box::new(envelope),
                    reason: DeadLetterReason::NotExported,
                });
                Ok(())
            }
        }
    }

    /// Run `callback` once the local actor at `target` stops.
    ///
    /// Fires immediately when it is already gone. Remote actors cannot be
    /// watched; their failure detection is external.
    pub fn watch<F>(&self, target: &ActorAddress, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !target.is_local_to(&self.inner.node) {
            debug!(target = %target, "Ignoring watch of a remote actor");
            return;
        }

        {
            let mut registry = self.inner.registry.lock();
            if registry.actors.contains_key(&target.path) {
                registry
                    .watchers
                    .entry(target.path.clone())
                    .or_default()
                    .push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn stats(&self) -> SystemStats {
        self.inner.metrics.snapshot()
    }

    /// Stop every actor and wait until all of them have torn down
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        info!(node = %self.inner.node, "Shutting down actor system");

        let signals: Vec<_> = self
            .inner
            .registry
            .lock()
            .actors
            .values()
            .map(|entry| entry.signals.clone())
            .collect();
        for signal in signals {
            let _ = signal.send(Signal::Stop);
        }

        loop {
            let notified = self.inner.idle.notified();
            let idle = self.inner.registry.lock().actors.is_empty();
            if idle {
                break;
            }
            notified.await;
        }
        info!(node = %self.inner.node, "Actor system shutdown complete");
    }

    pub(crate) fn unregister(&self, address: &ActorAddress) {
        let watchers = {
            let mut registry = self.inner.registry.lock();
            registry.actors.remove(&address.path);
            registry.watchers.remove(&address.path).unwrap_or_default()
        };
        self.inner.exports.write().remove(&address.path);

        for watcher in watchers {
            watcher();
        }
        self.inner.supervisor.on_stopped(address);
        self.inner.metrics.record_stopped();
        self.inner.idle.notify_waiters();
    }

    pub(crate) fn dead_ref<M: Message>(&self, address: ActorAddress) -> ActorRef<M> {
        ActorRef::dead(
            address,
            DeadLetterReason::RecipientStopped,
            self.inner.dead_letters.clone(),
        )
    }

    pub(crate) fn next_name(&self) -> String {
        self.inner.names.next_name()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub(crate) fn throughput(&self) -> usize {
        self.inner.throughput
    }

    pub(crate) fn supervisor(&self) -> &Arc<dyn Supervisor> {
        &self.inner.supervisor
    }

    pub(crate) fn dead_letters(&self) -> &DeadLetters {
        &self.inner.dead_letters
    }

    fn top_level(&self, name: &str) -> ActorAddress {
        ActorAddress::new(self.inner.node.clone(), name)
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("node", &self.inner.node)
            .field("actors", &self.actor_count())
            .field("transport", &self.inner.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_names_are_validated() {
        let system = ActorSystem::builder().build().unwrap();

        assert!(matches!(
            system.spawn(Behavior::<u32>::ignore(), ""),
            Err(ActorError::InvalidName { .. })
        ));
        assert!(matches!(
            system.spawn(Behavior::<u32>::ignore(), "a/b"),
            Err(ActorError::InvalidName { .. })
        ));
        assert!(matches!(
            system.spawn(Behavior::<u32>::ignore(), "$a"),
            Err(ActorError::InvalidName { .. })
        ));

        system.spawn(Behavior::<u32>::ignore(), "worker").unwrap();
        assert!(matches!(
            system.spawn(Behavior::<u32>::ignore(), "worker"),
            Err(ActorError::NameTaken { .. })
        ));
    }

    #[tokio::test]
    async fn test_anonymous_names_are_generated() {
        let system = ActorSystem::builder()
            .name_generator(NameGenerator::sequential(0))
            .build()
            .unwrap();

        let first = system.spawn_anonymous(Behavior::<u32>::ignore()).unwrap();
        let second = system.spawn_anonymous(Behavior::<u32>::ignore()).unwrap();
        assert_eq!(first.address().path, "$a");
        assert_eq!(second.address().path, "$b");
    }

    #[tokio::test]
    async fn test_resolve_local_checks_message_type() {
        let system = ActorSystem::builder().node_id("n1").build().unwrap();
        let worker = system.spawn(Behavior::<u32>::ignore(), "worker").unwrap();

        assert_eq!(system.resolve_local::<u32>(worker.address()), Some(worker.clone()));
        assert!(system.resolve_local::<String>(worker.address()).is_none());

        let elsewhere = ActorAddress::new(NodeId::from("n2"), "worker");
        let unreachable = system.resolve::<u32>(&elsewhere);
        assert!(unreachable.is_terminated());
    }

    #[test]
    fn test_build_requires_runtime() {
        assert!(matches!(
            ActorSystem::builder().build(),
            Err(ActorError::Runtime(_))
        ));
    }
}
