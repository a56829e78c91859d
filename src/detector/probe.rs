use async_trait::async_trait;
use std::time::Duration;

/// Endpoint every backend answers liveness checks on.
pub const ENDPOINT_HEARTBEAT: &str = "/heartbeat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
}

/// Checks whether the node at `address` responds within `timeout`.
#[async_trait]
pub trait LivenessProber: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> Liveness;
}

/// Probes `GET {address}/heartbeat`; any 2xx answer means alive.
#[derive(Debug, Clone, Default)]
pub struct HttpProber {
    http_client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LivenessProber for HttpProber {
    async fn probe(&self, address: &str, timeout: Duration) -> Liveness {
        let url = format!("{}{}", address.trim_end_matches('/'), ENDPOINT_HEARTBEAT);

        match self.http_client.get(url).timeout(timeout).send().await {
            Ok(resp) if resp.status().is_success() => Liveness::Alive,
            Ok(resp) => {
                tracing::debug!("Heartbeat of {} answered {}", address, resp.status());
                Liveness::Dead
            }
            Err(e) => {
                tracing::debug!("Heartbeat of {} failed: {}", address, e);
                Liveness::Dead
            }
        }
    }
}
