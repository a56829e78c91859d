//! Request Routing Module
//!
//! Looks a key up on the ring and forwards the request to the owning backend.
//! Forwarding failures are reported, never retried on another node: a retry would
//! hide a dead node from the failure detector.

pub mod backend;
pub mod service;

pub use backend::{BackendClient, HttpBackend};
pub use service::{RoutedResponse, Router};
