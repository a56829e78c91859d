use dashmap::DashMap;

use super::types::NodeId;

/// Per-node count of successfully routed requests.
#[derive(Debug, Default)]
pub struct LoadTracker {
    served: DashMap<NodeId, u64>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, node: &NodeId) {
        *self.served.entry(node.clone()).or_insert(0) += 1;
    }

    pub fn served(&self, node: &NodeId) -> u64 {
        self.served.get(node).map(|count| *count).unwrap_or(0)
    }

    pub fn forget(&self, node: &NodeId) {
        self.served.remove(node);
    }

    pub fn total(&self) -> u64 {
        self.served.iter().map(|entry| *entry.value()).sum()
    }
}
