use crate::capabilities::{CapabilityError, CapabilityResult};
use crate::{PhisError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., http://localhost:8000/v1
    pub model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VLLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8000/v1".to_string()),
            model: std::env::var("VLLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "qwen2.5-7b-instruct".to_string()),
            api_key: std::env::var("VLLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("VLLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.2),
            max_output_tokens: 1024,
        }
    }
}

/// Assistant text plus what the backend reported about it
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub provider: Option<String>, // "responses" or "chat.completions"
    pub usage: Option<serde_json::Value>,
}

/// HTTP client that prefers the OpenAI Responses API and falls back to Chat Completions
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| PhisError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }

    /// One completion for a system instruction and a user message.
    ///
    /// Errors: network failures, 429 and 5xx are `Transient`; other 4xx are
    /// `Terminal`; a response without text is `ValidationFailed`.
    pub async fn generate(&self, system: &str, user: &str) -> CapabilityResult<LlmResponse> {
        let base = self.cfg.base_url.trim_end_matches('/');

        // Try Responses API first
        let responses_url = format!("{}/responses", base);
        debug!(target: "llm_client", url = %responses_url, "POST via Responses API");

        let body = json!({
            "model": self.cfg.model,
            "instructions": system,
            "input": user,
            "max_output_tokens": self.cfg.max_output_tokens,
            "temperature": self.cfg.temperature,
        });

        match self.post(&responses_url).json(&body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    match resp.json::<serde_json::Value>().await {
                        Ok(val) => {
                            if let Some(text) = extract_text_from_responses(&val) {
                                return Ok(response_from(text, &val, "responses"));
                            }
                        }
                        Err(e) => {
                            warn!(target: "llm_client", error = %e, "Responses JSON unreadable; trying chat.completions fallback")
                        }
                    }
                } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                    return Err(classify_status(status, "responses"));
                } else if status != StatusCode::NOT_FOUND {
                    warn!(target: "llm_client", %status, "Responses API error; trying chat.completions fallback");
                }
            }
            Err(err) => {
                warn!(target: "llm_client", error = %err, "Responses API request failed; trying chat.completions fallback");
            }
        }

        // Fallback to Chat Completions
        let chat_url = format!("{}/chat/completions", base);
        debug!(target: "llm_client", url = %chat_url, "POST via Chat Completions");

        let body = json!({
            "model": self.cfg.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "max_tokens": self.cfg.max_output_tokens,
            "temperature": self.cfg.temperature,
        });

        let resp = self
            .post(&chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Transient(format!("Chat Completions HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(classify_status(status, "chat.completions"));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            CapabilityError::Transient(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            CapabilityError::ValidationFailed(
                "Missing choices[0].message.content in chat completions".into(),
            )
        })?;
        Ok(response_from(text, &val, "chat.completions"))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .http
            .post(url)
            .header("content-type", "application/json");
        match &self.cfg.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

fn response_from(text: String, val: &serde_json::Value, provider: &str) -> LlmResponse {
    LlmResponse {
        text,
        model: val
            .get("model")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        provider: Some(provider.to_string()),
        usage: val.get("usage").cloned(),
    }
}

fn classify_status(status: StatusCode, api: &str) -> CapabilityError {
    let msg = format!("{api} returned {status}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        CapabilityError::Transient(msg)
    } else {
        CapabilityError::Terminal(msg)
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn extract_text_from_responses(v: &serde_json::Value) -> Option<String> {
    if let Some(s) = v.get("output_text").and_then(|x| x.as_str()) {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    if let Some(arr) = v.get("output").and_then(|x| x.as_array()) {
        let acc: String = arr
            .iter()
            .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
            .flatten()
            .filter_map(|c| {
                c.get("text")
                    .and_then(|t| t.get("value"))
                    .and_then(|v| v.as_str())
                    .or_else(|| c.get("text").and_then(|v| v.as_str()))
            })
            .collect();
        if !acc.is_empty() {
            return Some(acc);
        }
    }
    extract_text_from_chat_completions(v)
}
