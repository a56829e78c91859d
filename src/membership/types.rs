use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical backend node (its hostname).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generates a fresh `dyn_server_xxxxxx` name from a v4 UUID.
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("dyn_server_{}", &suffix[..6]))
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
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle of a node as seen by the balancer.
///
/// `Requested -> Provisioning -> Live -> (Removing | Failed) -> Gone`.
/// Only `Live` nodes are on the ring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeState {
    /// Name reserved, provisioner not called yet.
    Requested,
    /// Waiting on the provisioner.
    Provisioning,
    /// On the ring and receiving traffic.
    Live,
    /// Evicted by an explicit removal, deprovisioning in progress.
    Removing,
    /// Evicted by the failure detector, deprovisioning in progress.
    Failed,
    /// Unknown to the balancer.
    Gone,
}

/// A live physical node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: NodeId,
    /// Base URL traffic for this node is forwarded to, e.g. `http://server1:8000`.
    pub address: String,
    /// Monotonic admission counter; lower means admitted earlier.
    pub admitted_seq: u64,
    /// Admission wall-clock time in milliseconds since the epoch.
    pub admitted_at: u64,
}

/// Read-only snapshot of a member for status reporting and selection policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub id: NodeId,
    pub address: String,
    pub admitted_seq: u64,
    pub admitted_at: u64,
    /// Requests successfully routed to this node.
    pub served: u64,
}

/// Why a single node in a batch did not make it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFailure {
    pub node: NodeId,
    pub error: String,
}

/// Result of `add_nodes`.
///
/// Nodes admitted before a failure stay admitted; `failure` names the node that
/// stopped the batch.
#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    pub added: Vec<Member>,
    pub failure: Option<NodeFailure>,
}

/// Result of `remove_nodes`. Every selected node is evicted, `failures` lists the
/// ones whose deprovisioning did not succeed.
#[derive(Debug, Clone, Default)]
pub struct RemoveOutcome {
    pub removed: Vec<NodeId>,
    pub failures: Vec<NodeFailure>,
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
