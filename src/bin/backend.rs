//! Minimal backend node: answers heartbeats and echoes which server handled a key.

use axum::extract::Path;
use axum::{Extension, Json, Router, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

struct Identity {
    server_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let server_id = std::env::var("SERVER_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "backend".to_string());
    let bind_addr: SocketAddr = std::env::var("BACKEND_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;

    let app = Router::new()
        .route("/heartbeat", get(heartbeat))
        .route("/:key", get(handle_key))
        .layer(Extension(Arc::new(Identity {
            server_id: server_id.clone(),
        })));

    tracing::info!("Backend {} listening on {}", server_id, bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn heartbeat(Extension(identity): Extension<Arc<Identity>>) -> Json<Value> {
    Json(json!({ "status": "alive", "server": identity.server_id }))
}

async fn handle_key(
    Extension(identity): Extension<Arc<Identity>>,
    Path(key): Path<String>,
) -> Json<Value> {
    Json(json!({
        "message": format!("Key '{}' was handled by server {}", key, identity.server_id)
    }))
}
