//! Node Provisioning
//!
//! The balancer never starts or stops backends itself. It asks a `NodeProvisioner`
//! to do so and only learns the address the new node can be reached at.

pub mod command;

pub use command::CommandProvisioner;

use anyhow::Result;
use async_trait::async_trait;

use crate::membership::types::NodeId;

/// Creates and destroys backend nodes.
#[async_trait]
pub trait NodeProvisioner: Send + Sync {
    /// Starts a node called `name` and returns the base URL it serves on.
    async fn provision(&self, name: &NodeId) -> Result<String>;

    /// Stops and discards the node called `name`.
    async fn deprovision(&self, name: &NodeId) -> Result<()>;
}
