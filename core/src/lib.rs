// PHIS Core Library
// Health advisory broadcast runtime: content fallback chain, translation,
// speech synthesis, QA gates and delivery.

pub mod capabilities;
pub mod content;
pub mod delivery;
pub mod inbound;
pub mod llm;
pub mod orchestrator;
pub mod retriever;
pub mod service;
pub mod sources;
pub mod subscribers;
pub mod telemetry;
pub mod validator;

mod fsutil;

// Export core types
pub use capabilities::{
    AudioHandle, Broadcaster, CapabilityError, CapabilityResult, DeliveryFailure, DeliveryReport,
    Notifier, SubscriptionStore, Synthesizer, Translator,
};
pub use content::{BroadcastOutcome, BroadcastRequest, ContentItem, ContentOrigin, Stage, Trigger};
pub use orchestrator::{Orchestrator, OrchestratorConfig, StageTimeouts};
pub use retriever::ContentRetriever;
pub use service::BroadcastService;
pub use sources::{ContentSource, ExtractionRules, Unavailable};
pub use validator::{AudioQa, QaViolation, TranslationQa};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhisError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Capability error: {0}")]
    CapabilityError(#[from] CapabilityError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhisError>;
