use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::backend::{BackendClient, is_routable_key};
use crate::error::BalancerError;
use crate::membership::service::MembershipManager;
use crate::membership::types::Member;

/// A backend answer tagged with the node that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedResponse {
    pub node: Member,
    pub response: Value,
}

pub struct Router {
    membership: Arc<MembershipManager>,
    backend: Arc<dyn BackendClient>,
    forward_timeout: Duration,
}

impl Router {
    pub fn new(
        membership: Arc<MembershipManager>,
        backend: Arc<dyn BackendClient>,
        forward_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            membership,
            backend,
            forward_timeout,
        })
    }

    pub fn membership(&self) -> &Arc<MembershipManager> {
        &self.membership
    }

    /// Resolves `key` and forwards it to its owner.
    pub async fn route(&self, key: &str) -> Result<RoutedResponse, BalancerError> {
        if !is_routable_key(key) {
            return Err(BalancerError::InvalidRequest(format!(
                "key '{}' cannot be routed",
                key
            )));
        }

        let node = self
            .membership
            .resolve(key)
            .await
            .ok_or(BalancerError::NoBackendAvailable)?;

        tracing::debug!("Routing '{}' to {} ({})", key, node.id, node.address);

        let forwarded = tokio::time::timeout(
            self.forward_timeout,
            self.backend.forward(&node.address, key, self.forward_timeout),
        )
        .await;

        match forwarded {
            Ok(Ok(response)) => {
                self.membership.record_served(&node.id).await;
                Ok(RoutedResponse { node, response })
            }
            Ok(Err(e)) => Err(BalancerError::BackendUnreachable {
                node: node.id,
                reason: e.to_string(),
            }),
            Err(_) => Err(BalancerError::BackendUnreachable {
                node: node.id,
                reason: format!("timed out after {:?}", self.forward_timeout),
            }),
        }
    }
}
