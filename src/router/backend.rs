use anyhow::{Result, anyhow, bail};
use reqwest::Url;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Sends a keyed request to one backend.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn forward(&self, address: &str, key: &str, timeout: Duration) -> Result<Value>;
}

/// Forwards as `GET {address}/{key}` and decodes the JSON body.
///
/// The key travels as a single percent-encoded path segment.
#[derive(Debug, Clone, Default)]
pub struct HttpBackend {
    http_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn forward(&self, address: &str, key: &str, timeout: Duration) -> Result<Value> {
        let url = key_url(address, key)?;

        let response = self.http_client.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            bail!("backend answered {}", response.status());
        }

        Ok(response.json().await?)
    }
}

/// Whether `key` can travel as one path segment. URL parsers collapse `.` and `..`.
pub fn is_routable_key(key: &str) -> bool {
    !matches!(key, "" | "." | "..")
}

fn key_url(address: &str, key: &str) -> Result<Url> {
    if !is_routable_key(key) {
        bail!("key '{}' cannot be sent as a path segment", key);
    }

    let mut url = Url::parse(address)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("backend address {} cannot carry a path", address))?
        .pop_if_empty()
        .push(key);
    Ok(url)
}
