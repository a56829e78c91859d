//! Slot hash functions.
//!
//! Both functions are pure: a request key always lands on the same slot no matter
//! which nodes are currently in the ring.

/// A position in the ring's modular slot space, always `< ring_size`.
pub type Slot = u32;

/// Hashes a request key into `[0, ring_size)`.
pub fn hash_request_key(key: &str, ring_size: u32) -> Slot {
    crc32fast::hash(key.as_bytes()) % ring_size
}

/// Preferred slot of replica `replica_index` of the physical node holding `physical_index`.
///
/// The preferred slot may already be taken; `HashRing::insert` probes forward from here.
pub fn hash_virtual_node(physical_index: u32, replica_index: u32, ring_size: u32) -> Slot {
    let label = format!("vnode-{}-{}", physical_index, replica_index);
    crc32fast::hash(label.as_bytes()) % ring_size
}
