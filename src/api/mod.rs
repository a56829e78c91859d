//! HTTP API Module
//!
//! Status, routing and control-plane endpoints of the balancer.
//!
//! - `GET /rep`: current membership.
//! - `GET /{key}`: route a keyed request to its owning backend.
//! - `POST /add`, `DELETE /rm`: scale the backend pool.

pub mod handlers;
pub mod protocol;

use axum::{
    Extension,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::router::Router;
use handlers::{handle_add, handle_remove, handle_route, handle_status};
use protocol::{ENDPOINT_ADD, ENDPOINT_REMOVE, ENDPOINT_ROUTE, ENDPOINT_STATUS};

/// Builds the axum application around a shared `Router`.
pub fn app(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .route(ENDPOINT_STATUS, get(handle_status))
        .route(ENDPOINT_ADD, post(handle_add))
        .route(ENDPOINT_REMOVE, delete(handle_remove))
        .route(ENDPOINT_ROUTE, get(handle_route))
        .layer(Extension(router))
        .layer(TraceLayer::new_for_http())
}
