//! Membership Module
//!
//! Keeps the authoritative set of live backend nodes and the hash ring in lockstep.
//!
//! ## Core Mechanisms
//! - **Single lock**: The ring and the member map live in one state object behind a
//!   read-write lock. Lookups run concurrently, any change excludes everything else.
//! - **Lifecycle**: Nodes move `Requested -> Provisioning -> Live -> (Removing | Failed) -> Gone`.
//!   A name is reserved before provisioning, so two requests can never claim the same node.
//! - **Partial progress**: Batch adds and removals report per-node outcomes instead of rolling back.
//! - **Selection policies**: Removal fill-in is delegated to a swappable `SelectionPolicy`.

pub mod load;
pub mod policy;
pub mod service;
pub mod types;
