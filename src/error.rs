use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::membership::types::NodeId;
use crate::ring::RingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalancerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No backend available")]
    NoBackendAvailable,

    #[error("Could not reach backend node: {node} ({reason})")]
    BackendUnreachable { node: NodeId, reason: String },

    #[error("Failed to provision node {node}: {reason}")]
    ProvisioningFailed { node: NodeId, reason: String },

    #[error("Node {0} already exists")]
    DuplicateNode(NodeId),
}

impl BalancerError {
    /// Node the error is about, when there is one.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            BalancerError::BackendUnreachable { node, .. }
            | BalancerError::ProvisioningFailed { node, .. }
            | BalancerError::DuplicateNode(node) => Some(node),
            BalancerError::InvalidRequest(_) | BalancerError::NoBackendAvailable => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BalancerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BalancerError::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            BalancerError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
            BalancerError::ProvisioningFailed { .. } => StatusCode::BAD_GATEWAY,
            BalancerError::DuplicateNode(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<RingError> for BalancerError {
    fn from(err: RingError) -> Self {
        match err {
            RingError::AlreadyPresent(node) => BalancerError::DuplicateNode(node),
            other => BalancerError::InvalidRequest(other.to_string()),
        }
    }
}

impl IntoResponse for BalancerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            BalancerError::BackendUnreachable { node, reason } => {
                tracing::warn!("Backend {} unreachable: {}", node, reason);
                json!({ "error": self.to_string(), "node": node, "status": "failure" })
            }
            BalancerError::ProvisioningFailed { node, reason } => {
                tracing::error!("Provisioning of {} failed: {}", node, reason);
                json!({ "error": self.to_string(), "status": "failure" })
            }
            _ => json!({ "error": self.to_string(), "status": "failure" }),
        };
        (status, Json(body)).into_response()
    }
}
