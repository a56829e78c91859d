use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use super::hash::{Slot, hash_request_key, hash_virtual_node};
use crate::membership::types::NodeId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("node {0} is already placed on the ring")]
    AlreadyPresent(NodeId),

    #[error("ring has {free} free slots, {needed} are required")]
    Exhausted { free: u32, needed: u32 },

    #[error("invalid ring geometry: {slots} slots for {virtual_nodes} virtual nodes per node")]
    InvalidGeometry { slots: u32, virtual_nodes: u32 },
}

/// Where a physical node sits on the ring.
#[derive(Debug, Clone)]
struct Placement {
    physical_index: u32,
    slots: Vec<Slot>,
}

/// Slot space of fixed size `ring_size` with `virtual_nodes` entries per physical node.
///
/// `slots` is both the slot -> node mapping and the ordered sequence used for
/// successor lookups, so the two can never drift apart. `placements` indexes the
/// same entries by owner and must always hold exactly the owners found in `slots`.
#[derive(Debug, Clone)]
pub struct HashRing {
    ring_size: u32,
    virtual_nodes: u32,
    slots: BTreeMap<Slot, NodeId>,
    placements: HashMap<NodeId, Placement>,
}

impl HashRing {
    pub fn new(ring_size: u32, virtual_nodes: u32) -> Result<Self, RingError> {
        if virtual_nodes == 0 || ring_size <= virtual_nodes {
            return Err(RingError::InvalidGeometry {
                slots: ring_size,
                virtual_nodes,
            });
        }

        Ok(Self {
            ring_size,
            virtual_nodes,
            slots: BTreeMap::new(),
            placements: HashMap::new(),
        })
    }

    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    pub fn virtual_nodes(&self) -> u32 {
        self.virtual_nodes
    }

    /// Places `K` virtual nodes for `node` and returns the slots they ended up on.
    ///
    /// The node takes the smallest physical index no current member holds, so a
    /// node inserted after a removal reuses the freed index and its preferred slots.
    pub fn insert(&mut self, node: &NodeId) -> Result<Vec<Slot>, RingError> {
        if self.placements.contains_key(node) {
            return Err(RingError::AlreadyPresent(node.clone()));
        }

        let free = self.free_slots();
        if free < self.virtual_nodes {
            return Err(RingError::Exhausted {
                free,
                needed: self.virtual_nodes,
            });
        }

        let physical_index = self.next_physical_index();
        let mut placed = Vec::with_capacity(self.virtual_nodes as usize);

        for replica in 0..self.virtual_nodes {
            let mut slot = hash_virtual_node(physical_index, replica, self.ring_size);
            // Terminates: at least `virtual_nodes - replica` slots are still free.
            while self.slots.contains_key(&slot) {
                slot = (slot + 1) % self.ring_size;
            }
            self.slots.insert(slot, node.clone());
            placed.push(slot);
        }

        tracing::debug!(
            "Placed {:?} (index {}) on slots {:?}",
            node,
            physical_index,
            placed
        );

        self.placements.insert(
            node.clone(),
            Placement {
                physical_index,
                slots: placed.clone(),
            },
        );

        Ok(placed)
    }

    /// Drops every slot owned by `node`. Returns the freed slots; empty when the node was absent.
    pub fn remove(&mut self, node: &NodeId) -> Vec<Slot> {
        let Some(placement) = self.placements.remove(node) else {
            return Vec::new();
        };

        for slot in &placement.slots {
            self.slots.remove(slot);
        }

        placement.slots
    }

    /// Owner of `key`: the first occupied slot at or after the key's slot, wrapping.
    pub fn resolve(&self, key: &str) -> Option<&NodeId> {
        self.resolve_slot(key).map(|(_, node)| node)
    }

    /// Like [`HashRing::resolve`] but also reports which slot answered.
    pub fn resolve_slot(&self, key: &str) -> Option<(Slot, &NodeId)> {
        let hashed = hash_request_key(key, self.ring_size);

        self.slots
            .range(hashed..)
            .next()
            .or_else(|| self.slots.iter().next())
            .map(|(slot, node)| (*slot, node))
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.placements.contains_key(node)
    }

    pub fn slots_of(&self, node: &NodeId) -> Vec<Slot> {
        self.placements
            .get(node)
            .map(|placement| placement.slots.clone())
            .unwrap_or_default()
    }

    pub fn physical_index_of(&self, node: &NodeId) -> Option<u32> {
        self.placements
            .get(node)
            .map(|placement| placement.physical_index)
    }

    pub fn owner_of_slot(&self, slot: Slot) -> Option<&NodeId> {
        self.slots.get(&slot)
    }

    /// Occupied slots in ascending order.
    pub fn occupied_slots(&self) -> Vec<Slot> {
        self.slots.keys().copied().collect()
    }

    pub fn nodes(&self) -> HashSet<NodeId> {
        self.placements.keys().cloned().collect()
    }

    /// Number of physical nodes on the ring.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn free_slots(&self) -> u32 {
        self.ring_size - self.slots.len() as u32
    }

    fn next_physical_index(&self) -> u32 {
        let taken: HashSet<u32> = self
            .placements
            .values()
            .map(|placement| placement.physical_index)
            .collect();

        (0..).find(|index| !taken.contains(index)).unwrap_or_default()
    }
}
