//! Node and actor addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one actor system in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Location-independent name of an actor: owning node plus path on that node.
///
/// This is the only part of an [`ActorRef`](crate::ActorRef) that crosses the
/// wire; a peer turns it back into a reference with
/// [`ActorSystem::resolve`](crate::ActorSystem::resolve).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorAddress {
    pub node: NodeId,
    pub path: String,
}

impl ActorAddress {
    pub fn new(node: NodeId, path: impl Into<String>) -> Self {
        Self {
            node,
            path: path.into(),
        }
    }

    pub fn is_local_to(&self, node: &NodeId) -> bool {
        &self.node == node
    }

    /// Address of a child actor spawned under this one
    pub fn child(&self, name: &str) -> Self {
        Self::new(self.node.clone(), format!("{}/{}", self.path, name))
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mycelium://{}/{}", self.node, self.path)
    }
}
