//! Shared HTTP plumbing for web and feed sources.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP settings shared by network-backed sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    /// Timeout for a single request in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: "phis-agent/0.1".to_string(),
        }
    }
}

pub(crate) fn build_client(config: &HttpSourceConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .user_agent(&config.user_agent)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET `url` and return the body text, or a human-readable reason.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    label: &str,
    url: &str,
) -> Result<String, String> {
    debug!(target: "sources", source = %label, url = %url, "Fetching");

    let response = client.get(url).send().await.map_err(|e| {
        warn!(target: "sources", source = %label, error = %e, "Request failed");
        format!("request failed: {}", e)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        warn!(target: "sources", source = %label, status = %status, "Source returned error status");
        return Err(format!("status {}", status));
    }

    response
        .text()
        .await
        .map_err(|e| format!("failed to read body: {}", e))
}
