//! Consistent Hash Ring Module
//!
//! Maps request keys onto a fixed modular slot space and from there onto the
//! physical backend nodes that own those slots.
//!
//! ## Core Concepts
//! - **Slots**: The ring is `M` positions wide. Request keys and virtual nodes are both hashed into it.
//! - **Virtual Nodes**: Every physical node occupies `K` slots to smooth the key distribution.
//!   Slot collisions are resolved by linear probing, so a slot is never shared.
//! - **Ownership**: A key belongs to the first occupied slot at or after its own slot,
//!   wrapping around to the lowest occupied slot (clockwise walk).

pub mod hash;
pub mod ring;

pub use hash::{Slot, hash_request_key, hash_virtual_node};
pub use ring::{HashRing, RingError};
