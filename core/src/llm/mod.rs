//! LLM-backed translation
//!
//! - `LlmClientConfig`, `LlmClient` for OpenAI-compatible backends
//! - `LlmTranslator`, the `Translator` capability built on top

mod client;
mod translator;

pub use client::{LlmClient, LlmClientConfig, LlmResponse};
pub use translator::LlmTranslator;
