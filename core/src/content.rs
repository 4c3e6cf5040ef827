//! Broadcast data model: content items, requests and outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a piece of content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Web,
    Feed,
    Cache,
    SafeDefault,
    User,
}

/// A non-empty piece of English advisory text with its provenance.
///
/// Immutable once created; the only constructor rejects blank text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    text: String,
    source_label: String,
    origin: ContentOrigin,
    retrieved_at: DateTime<Utc>,
}

impl ContentItem {
    /// Returns `None` when `text` is empty or whitespace only.
    pub fn new(
        text: impl Into<String>,
        source_label: impl Into<String>,
        origin: ContentOrigin,
    ) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text,
            source_label: source_label.into(),
            origin,
            retrieved_at: Utc::now(),
        })
    }

    /// For compile-time messages known to be non-empty.
    pub(crate) fn constant(text: &'static str, source_label: &str, origin: ContentOrigin) -> Self {
        debug_assert!(!text.trim().is_empty());
        Self {
            text: text.trim().to_string(),
            source_label: source_label.to_string(),
            origin,
            retrieved_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn origin(&self) -> ContentOrigin {
        self.origin
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }
}

/// What started a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    User,
}

/// Input to the orchestrator. Not retained after processing.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub english_text: String,
    pub source_label: String,
    pub trigger: Trigger,
    pub origin: ContentOrigin,
}

impl BroadcastRequest {
    /// A user-submitted broadcast. Blank text makes the orchestrator retrieve content instead.
    pub fn user(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            english_text: text.into(),
            source_label: source_label.into(),
            trigger: Trigger::User,
            origin: ContentOrigin::User,
        }
    }

    /// A scheduled broadcast built from retrieved content.
    pub fn scheduled(item: ContentItem) -> Self {
        Self {
            english_text: item.text,
            source_label: item.source_label,
            trigger: Trigger::Scheduled,
            origin: item.origin,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.english_text.trim().is_empty()
    }
}

/// Pipeline stages, in execution order. `Delivered` is the terminal success stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Content,
    Translation,
    TranslationQa,
    Synthesis,
    AudioQa,
    Delivery,
    Delivered,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Content => "content",
            Stage::Translation => "translation",
            Stage::TranslationQa => "translation-qa",
            Stage::Synthesis => "synthesis",
            Stage::AudioQa => "audio-qa",
            Stage::Delivery => "delivery",
            Stage::Delivered => "delivered",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastOutcome {
    success: bool,
    stage_reached: Stage,
    failure_reason: Option<String>,
}

impl BroadcastOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            stage_reached: Stage::Delivered,
            failure_reason: None,
        }
    }

    pub fn aborted(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stage_reached: stage,
            failure_reason: Some(reason.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Last stage attempted; on failure this is the stage that aborted.
    pub fn stage_reached(&self) -> Stage {
        self.stage_reached
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_rejects_blank_text() {
        assert!(ContentItem::new("", "WHO", ContentOrigin::Web).is_none());
        assert!(ContentItem::new("   \n\t", "WHO", ContentOrigin::Web).is_none());

        let item = ContentItem::new("  Sleep under a net  ", "WHO", ContentOrigin::Web).unwrap();
        assert_eq!(item.text(), "Sleep under a net");
        assert_eq!(item.source_label(), "WHO");
    }

    #[test]
    fn test_scheduled_request_keeps_origin() {
        let item = ContentItem::new("text", "CACHE-CDC", ContentOrigin::Cache).unwrap();
        let req = BroadcastRequest::scheduled(item);
        assert_eq!(req.trigger, Trigger::Scheduled);
        assert_eq!(req.origin, ContentOrigin::Cache);
        assert_eq!(req.source_label, "CACHE-CDC");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::TranslationQa.to_string(), "translation-qa");
        assert_eq!(Stage::AudioQa.as_str(), "audio-qa");
        assert!(Stage::Content < Stage::Delivered);
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = BroadcastOutcome::delivered();
        assert!(ok.success());
        assert_eq!(ok.stage_reached(), Stage::Delivered);
        assert!(ok.failure_reason().is_none());

        let failed = BroadcastOutcome::aborted(Stage::Synthesis, "engine missing");
        assert!(!failed.success());
        assert_eq!(failed.failure_reason(), Some("engine missing"));
    }
}
