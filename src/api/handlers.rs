use axum::{
    Extension, Json,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::protocol::*;
use crate::error::BalancerError;
use crate::membership::service::MembershipManager;
use crate::router::Router;

pub async fn handle_status(Extension(router): Extension<Arc<Router>>) -> Json<StatusResponse> {
    let nodes = router
        .membership()
        .list_members()
        .await
        .into_iter()
        .map(|member| member.address)
        .collect();

    Json(StatusResponse {
        message: "Load Balancer up and running!".to_string(),
        nodes,
    })
}

pub async fn handle_route(
    Extension(router): Extension<Arc<Router>>,
    Path(key): Path<String>,
) -> Result<Json<RouteResponse>, BalancerError> {
    let routed = router.route(&key).await?;

    Ok(Json(RouteResponse {
        node: routed.node.address,
        response: routed.response,
    }))
}

pub async fn handle_add(
    Extension(router): Extension<Arc<Router>>,
    payload: Result<Json<ScaleRequest>, JsonRejection>,
) -> Result<Response, BalancerError> {
    let (count, hostnames) = parse_scale_request(payload)?;
    let membership = router.membership();

    let outcome = membership.add_nodes(count, hostnames).await?;
    let message = replica_summary(membership).await;

    match outcome.failure {
        None => {
            tracing::info!("Added {} node(s), N={}", outcome.added.len(), message.n);
            Ok(Json(ScaleResponse {
                message,
                status: STATUS_SUCCESSFUL.to_string(),
                error: None,
                failed: Vec::new(),
            })
            .into_response())
        }
        Some(failure) => {
            tracing::error!(
                "Add stopped at {} after {} node(s): {}",
                failure.node,
                outcome.added.len(),
                failure.error
            );
            let body = ScaleResponse {
                message,
                status: STATUS_FAILURE.to_string(),
                error: Some(failure.error.clone()),
                failed: vec![FailedNode {
                    hostname: failure.node.0,
                    error: failure.error,
                }],
            };
            Ok((StatusCode::BAD_GATEWAY, Json(body)).into_response())
        }
    }
}

pub async fn handle_remove(
    Extension(router): Extension<Arc<Router>>,
    payload: Result<Json<ScaleRequest>, JsonRejection>,
) -> Result<Json<ScaleResponse>, BalancerError> {
    let (count, hostnames) = parse_scale_request(payload)?;
    let membership = router.membership();

    let outcome = membership.remove_nodes(count, hostnames).await?;
    let message = replica_summary(membership).await;

    let status = if outcome.failures.is_empty() {
        STATUS_SUCCESSFUL
    } else {
        STATUS_PARTIAL
    };
    tracing::info!(
        "Removed {:?}, N={} ({})",
        outcome.removed,
        message.n,
        status
    );

    Ok(Json(ScaleResponse {
        message,
        status: status.to_string(),
        error: None,
        failed: outcome
            .failures
            .into_iter()
            .map(|failure| FailedNode {
                hostname: failure.node.0,
                error: failure.error,
            })
            .collect(),
    }))
}

fn parse_scale_request(
    payload: Result<Json<ScaleRequest>, JsonRejection>,
) -> Result<(usize, Vec<String>), BalancerError> {
    let Json(req) = payload.map_err(|e| BalancerError::InvalidRequest(e.body_text()))?;

    let count = match req.n {
        Some(n) if n > 0 => n as usize,
        _ => {
            return Err(BalancerError::InvalidRequest(
                "Invalid 'n'. Must be a positive integer.".to_string(),
            ));
        }
    };

    Ok((count, req.hostnames))
}

async fn replica_summary(membership: &MembershipManager) -> ReplicaSummary {
    let replicas: Vec<String> = membership
        .list_members()
        .await
        .into_iter()
        .map(|member| member.id.0)
        .collect();

    ReplicaSummary {
        n: replicas.len(),
        replicas,
    }
}
