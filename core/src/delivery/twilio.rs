//! WhatsApp delivery through the Twilio Messages API.
//!
//! Each recipient gets the text message followed by a media message pointing at
//! the synthesized audio (`{public_url}/audio/{file}`). Sends run concurrently;
//! the report is assembled only after every send has finished. The fan-out
//! runs on its own task, so a caller that stops waiting does not cut a
//! recipient off between the text and the audio.

use crate::capabilities::{
    AudioHandle, Broadcaster, CapabilityError, CapabilityResult, DeliveryFailure, DeliveryReport,
    Notifier, SubscriptionStore,
};
use crate::{PhisError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender, e.g. `whatsapp:+14155238886`
    pub from_number: String,
    /// Externally reachable base URL of the audio file server
    pub public_url: String,
    pub api_base: String,
    pub request_timeout_ms: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|s| !s.is_empty());
        Self {
            account_sid: env("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            auth_token: env("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            from_number: env("TWILIO_NUMBER").unwrap_or_default(),
            public_url: env("PUBLIC_URL").unwrap_or_else(|| "http://localhost:5000".to_string()),
            api_base: "https://api.twilio.com".to_string(),
            request_timeout_ms: env("TWILIO_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(15_000),
        }
    }
}

impl TwilioConfig {
    pub fn has_credentials(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

pub struct TwilioBroadcaster {
    config: Arc<TwilioConfig>,
    http: reqwest::Client,
    store: Arc<dyn SubscriptionStore>,
}

impl TwilioBroadcaster {
    pub fn new(config: TwilioConfig, store: Arc<dyn SubscriptionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| PhisError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        if !config.has_credentials() {
            warn!(target: "delivery", "Twilio credentials incomplete; broadcasts will fail");
        }
        Ok(Self {
            config: Arc::new(config),
            http,
            store,
        })
    }

    /// Public URL under which the audio file is served
    pub fn media_url(&self, audio: &AudioHandle) -> Option<String> {
        audio.file_name().map(|name| {
            format!("{}/audio/{}", self.config.public_url.trim_end_matches('/'), name)
        })
    }
}

/// POST one message; `Err` carries a short reason
async fn send_message(
    http: &reqwest::Client,
    config: &TwilioConfig,
    to: &str,
    body: Option<&str>,
    media_url: Option<&str>,
) -> std::result::Result<(), String> {
    let mut form: Vec<(&str, &str)> = vec![("From", config.from_number.as_str()), ("To", to)];
    if let Some(body) = body {
        form.push(("Body", body));
    }
    if let Some(url) = media_url {
        form.push(("MediaUrl", url));
    }

    let resp = http
        .post(config.messages_url())
        .basic_auth(&config.account_sid, Some(&config.auth_token))
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(format!("status {status}: {text}"))
    }
}

#[async_trait]
impl Broadcaster for TwilioBroadcaster {
    async fn resolve_subscribers(&self) -> CapabilityResult<Vec<String>> {
        self.store
            .active_subscribers()
            .await
            .map_err(|e| CapabilityError::Unavailable(format!("subscriber store: {e}")))
    }

    async fn broadcast(
        &self,
        text: &str,
        audio: Option<&AudioHandle>,
    ) -> CapabilityResult<DeliveryReport> {
        let recipients = self.resolve_subscribers().await?;
        info!(target: "delivery", recipients = recipients.len(), "Broadcasting");
        if recipients.is_empty() {
            return Ok(DeliveryReport::default());
        }
        if !self.config.has_credentials() {
            return Err(CapabilityError::Terminal("Twilio credentials missing".into()));
        }

        let media_url = audio.and_then(|a| self.media_url(a));
        let body: Arc<str> = Arc::from(text);
        let task = tokio::spawn(fan_out(
            self.http.clone(),
            self.config.clone(),
            recipients,
            body,
            media_url,
        ));
        let report = task
            .await
            .map_err(|e| CapabilityError::Transient(format!("delivery task failed: {e}")))?;

        if report.all_failed() {
            return Err(CapabilityError::Transient(format!(
                "no recipient reached ({} attempted)",
                report.attempted
            )));
        }
        Ok(report)
    }
}

#[async_trait]
impl Notifier for TwilioBroadcaster {
    async fn notify(&self, to: &str, text: &str) -> CapabilityResult<()> {
        if !self.config.has_credentials() {
            return Err(CapabilityError::Terminal("Twilio credentials missing".into()));
        }
        send_message(&self.http, &self.config, to, Some(text), None)
            .await
            .map_err(CapabilityError::Transient)
    }
}

/// Send to every recipient and collect the outcome once all sends are done
async fn fan_out(
    http: reqwest::Client,
    config: Arc<TwilioConfig>,
    recipients: Vec<String>,
    body: Arc<str>,
    media_url: Option<String>,
) -> DeliveryReport {
    let mut sends = JoinSet::new();

    for to in recipients.iter().cloned() {
        let http = http.clone();
        let config = config.clone();
        let body = body.clone();
        let media_url = media_url.clone();
        sends.spawn(async move {
            let mut result = send_message(&http, &config, &to, Some(&*body), None).await;
            if result.is_ok() {
                if let Some(url) = media_url.as_deref() {
                    result = send_message(&http, &config, &to, None, Some(url)).await;
                }
            }
            (to, result)
        });
    }

    let mut report = DeliveryReport {
        attempted: recipients.len(),
        ..Default::default()
    };
    while let Some(joined) = sends.join_next().await {
        match joined {
            Ok((to, Ok(()))) => {
                debug!(target: "delivery", recipient = %to, "Sent");
                report.delivered += 1;
            }
            Ok((to, Err(reason))) => {
                warn!(target: "delivery", recipient = %to, reason = %reason, "Send failed");
                report.failures.push(DeliveryFailure {
                    recipient: to,
                    reason,
                });
            }
            Err(e) => {
                warn!(target: "delivery", error = %e, "Send task failed");
                report.failures.push(DeliveryFailure {
                    recipient: String::new(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        target: "delivery",
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failures.len(),
        "Broadcast finished"
    );
    report
}
