//! Capability contracts consumed by the orchestrator.
//!
//! Each external collaborator (translation model, speech synthesis, message
//! transport, subscriber store) sits behind one narrow async trait. The
//! orchestrator only sees these traits and `CapabilityError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// No result right now; expected and non-exceptional
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Output came back but is structurally unacceptable
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Network or backend hiccup; worth another attempt
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Programming or configuration error; retrying will not help
    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl CapabilityError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CapabilityError::Terminal(_))
    }
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Run a capability call with an upper bound on its latency
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> CapabilityResult<T>
where
    F: std::future::Future<Output = CapabilityResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout(limit)),
    }
}

/// Text → text translation (English into the broadcast language)
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> CapabilityResult<String>;
}

/// Text → audio artifact
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> CapabilityResult<AudioHandle>;
}

/// Synthesized audio on disk, with the two properties the audio QA gate inspects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioHandle {
    path: PathBuf,
    byte_size: u64,
    duration: Duration,
}

impl AudioHandle {
    pub fn new(path: impl Into<PathBuf>, byte_size: u64, duration: Duration) -> Self {
        Self {
            path: path.into(),
            byte_size,
            duration,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Decoded playback duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// One recipient that could not be reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub reason: String,
}

/// Aggregate result of a broadcast, reported after every per-recipient attempt finished
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// True when there were recipients and none of them got the message
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.delivered == 0
    }
}

/// Message transport to the subscriber list
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Current recipients, in a stable order
    async fn resolve_subscribers(&self) -> CapabilityResult<Vec<String>>;

    /// Deliver `text` (and `audio`, when present) to every resolved subscriber
    async fn broadcast(
        &self,
        text: &str,
        audio: Option<&AudioHandle>,
    ) -> CapabilityResult<DeliveryReport>;
}

/// Direct text message to a single recipient, outside any broadcast
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, to: &str, text: &str) -> CapabilityResult<()>;
}

/// Persistent subscriber list, mutated by inbound commands
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn mark_unsubscribed(&self, id: &str) -> crate::Result<()>;

    async fn record_activity(&self, id: &str) -> crate::Result<()>;

    async fn active_subscribers(&self) -> crate::Result<Vec<String>>;
}
