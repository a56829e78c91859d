//! HTTP Protocol
//!
//! Endpoints and request/response bodies of the balancer's HTTP surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENDPOINT_STATUS: &str = "/rep";
pub const ENDPOINT_ADD: &str = "/add";
pub const ENDPOINT_REMOVE: &str = "/rm";
pub const ENDPOINT_ROUTE: &str = "/:key";

pub const STATUS_SUCCESSFUL: &str = "successful";
pub const STATUS_PARTIAL: &str = "partial";
pub const STATUS_FAILURE: &str = "failure";

/// Body of `POST /add` and `DELETE /rm`.
///
/// `n` stays signed and optional so bad values are reported as invalid requests
/// rather than as deserialisation failures.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub n: Option<i64>,
    #[serde(default)]
    pub hostnames: Vec<String>,
}

/// Replica count and hostnames after a scaling operation.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReplicaSummary {
    #[serde(rename = "N")]
    pub n: usize,
    pub replicas: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FailedNode {
    pub hostname: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaleResponse {
    pub message: ReplicaSummary,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedNode>,
}

/// Body of `GET /rep`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    pub nodes: Vec<String>,
}

/// Body of a successful `GET /{key}`; `node` is the serving node's address.
#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    pub node: String,
    pub response: Value,
}
