//! Node-to-Node Transport
//!
//! The runtime only needs one operation from the network: hand opaque bytes
//! to a node. [`Transport`] is that seam. Inbound bytes are fed back through
//! [`ActorSystem::deliver_inbound`](crate::ActorSystem::deliver_inbound).
//!
//! [`InMemoryNetwork`] connects several actor systems inside one process and
//! can partition pairs of nodes, which is what the integration tests use to
//! exercise replication.

use crate::address::NodeId;
use crate::error::{ActorError, Result};
use crate::system::ActorSystem;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Delivers encoded envelopes to other nodes.
///
/// `send` must not block; a transport that cannot accept the bytes right now
/// returns an error and the runtime routes the message to dead letters.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, node: &NodeId, bytes: Bytes) -> Result<()>;
}

/// Transport counters
#[derive(Debug, Default)]
pub struct TransportMetrics {
    pub messages_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub messages_received: AtomicU64,
}

impl TransportMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_send(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

/// Transport statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub messages_received: u64,
}

#[derive(Default)]
struct NetworkInner {
    nodes: RwLock<HashMap<NodeId, mpsc::UnboundedSender<Bytes>>>,
    partitions: RwLock<HashSet<(NodeId, NodeId)>>,
    metrics: Arc<TransportMetrics>,
}

/// In-process network joining actor systems by [`NodeId`].
///
/// Each attached node gets one inbound queue drained by a pump task, so
/// bytes between a pair of nodes arrive in send order.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport handle sending on behalf of `node`
    pub fn transport(&self, node: NodeId) -> Arc<dyn Transport> {
        Arc::new(NetworkTransport {
            local: node,
            network: self.clone(),
        })
    }

    /// Start delivering bytes addressed to `system`'s node.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, system: &ActorSystem) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Bytes>();
        let node = system.node_id().clone();
        self.inner.nodes.write().insert(node.clone(), sender);

        let system = system.clone();
        let metrics = self.inner.metrics.clone();
        tokio::spawn(async move {
            while let Some(bytes) = receiver.recv().await {
                metrics.record_receive();
                if let Err(e) = system.deliver_inbound(bytes) {
                    warn!(node = %system.node_id(), error = %e, "Dropping inbound message");
                }
            }
            debug!(node = %system.node_id(), "Inbound pump finished");
        });
        debug!(node = %node, "Node attached to in-memory network");
    }

    /// Remove `node`; later sends to it fail as unreachable
    pub fn detach(&self, node: &NodeId) {
        self.inner.nodes.write().remove(node);
    }

    /// Drop all traffic between `a` and `b` in both directions
    pub fn partition(&self, a: &NodeId, b: &NodeId) {
        let mut partitions = self.inner.partitions.write();
        partitions.insert((a.clone(), b.clone()));
        partitions.insert((b.clone(), a.clone()));
        debug!(a = %a, b = %b, "Network partitioned");
    }

    pub fn heal(&self, a: &NodeId, b: &NodeId) {
        let mut partitions = self.inner.partitions.write();
        partitions.remove(&(a.clone(), b.clone()));
        partitions.remove(&(b.clone(), a.clone()));
        debug!(a = %a, b = %b, "Network partition healed");
    }

    pub fn heal_all(&self) {
        self.inner.partitions.write().clear();
    }

    pub fn metrics(&self) -> Arc<TransportMetrics> {
        self.inner.metrics.clone()
    }

    fn route(&self, from: &NodeId, to: &NodeId, bytes: Bytes) -> Result<()> {
        if self
            .inner
            .partitions
            .read()
            .contains(&(from.clone(), to.clone()))
        {
            self.inner.metrics.record_failure();
            return Err(ActorError::unreachable(to, "partitioned"));
        }

        let len = bytes.len();
        let nodes = self.inner.nodes.read();
        let sender = match nodes.get(to) {
            Some(sender) => sender,
            None => {
                self.inner.metrics.record_failure();
                return Err(ActorError::unreachable(to, "not attached"));
            }
        };
        if sender.send(bytes).is_err() {
            self.inner.metrics.record_failure();
            return Err(ActorError::unreachable(to, "inbound queue closed"));
        }

        self.inner.metrics.record_send(len);
        trace!(from = %from, to = %to, bytes = len, "Routed message");
        Ok(())
    }
}

impl fmt::Debug for InMemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryNetwork")
            .field("nodes", &self.inner.nodes.read().len())
            .field("partitions", &(self.inner.partitions.read().len() / 2))
            .finish()
    }
}

struct NetworkTransport {
    local: NodeId,
    network: InMemoryNetwork,
}

impl fmt::Debug for NetworkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkTransport")
            .field("local", &self.local)
            .finish()
    }
}

impl Transport for NetworkTransport {
    fn send(&self, node: &NodeId, bytes: Bytes) -> Result<()> {
        self.network.route(&self.local, node, bytes)
    }
}
