//! Consistent-Hashing Load Balancer Library
//!
//! This library crate defines the core modules of the balancer.
//! It serves as the foundation for the `ring-balancer` binary (`main.rs`).
//!
//! ## Architecture Modules
//! - **`ring`**: The fixed-size slot ring. Places `K` virtual nodes per backend and resolves
//!   request keys to the clockwise-nearest owner.
//! - **`membership`**: The authoritative set of live backends. Serialises every add and removal
//!   against the ring behind a single read-write lock.
//! - **`router`**: Resolves a key and forwards the request to its owner, surfacing failures
//!   instead of retrying elsewhere.
//! - **`detector`**: Periodic liveness probing. Evicts unresponsive backends and requests
//!   replacements from the provisioner.
//! - **`provisioner`**: The boundary to whatever actually starts and stops backends.
//! - **`api`**: The HTTP surface (status, routing, scaling).

pub mod api;
pub mod config;
pub mod detector;
pub mod error;
pub mod membership;
pub mod provisioner;
pub mod ring;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;
