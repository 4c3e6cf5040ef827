//! Content sources for the retriever's fallback chain.
//!
//! Every source either yields a non-empty `ContentItem` or an explicit
//! `Unavailable`; nothing else crosses the boundary.
//!
//! Variants:
//! - `WebPageSource`: CSS-selected paragraphs from an HTML page
//! - `FeedSource`: RSS 2.0 / Atom item summaries
//! - `CachedMessageSource`: round-robin over a fixed message list
//! - `SafeDefaultSource`: constant message, never unavailable

use crate::content::ContentItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod fallback;
pub mod feed;
pub mod http;
pub mod web;

pub use cache::{CachedMessage, CachedMessageSource, CursorStore};
pub use fallback::SafeDefaultSource;
pub use feed::FeedSource;
pub use web::WebPageSource;

/// A source has nothing to offer right now
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_label} unavailable: {reason}")]
pub struct Unavailable {
    pub source_label: String,
    pub reason: String,
}

impl Unavailable {
    pub fn new(source_label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_label: source_label.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Label used in logs and as the content's source label
    fn label(&self) -> &str;

    async fn fetch(&self) -> Result<ContentItem, Unavailable>;
}

/// Bounds applied to scraped text before it enters the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRules {
    /// Fragments must be strictly longer than this many characters
    pub min_fragment_chars: usize,
    pub max_fragments: usize,
    pub max_chars: usize,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            min_fragment_chars: 40,
            max_fragments: 4,
            max_chars: 700,
        }
    }
}

impl ExtractionRules {
    /// Keep long-enough fragments, join up to `max_fragments` of them and cap the
    /// result at `max_chars`. `None` when nothing survives.
    pub fn apply<I, S>(&self, fragments: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kept: Vec<String> = fragments
            .into_iter()
            .map(|f| collapse_whitespace(f.as_ref()))
            .filter(|f| f.chars().count() > self.min_fragment_chars)
            .take(self.max_fragments)
            .collect();
        if kept.is_empty() {
            return None;
        }
        let text = truncate_chars(&kept.join(" "), self.max_chars);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max` chars, preferring the last word boundary in the upper half.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    let Some((cut, _)) = s.char_indices().nth(max) else {
        return s.to_string();
    };
    let head = &s[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(ws) if ws >= cut / 2 => &head[..ws],
        _ => head,
    };
    head.trim_end().to_string()
}
