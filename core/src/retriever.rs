//! Tiered content retrieval.
//!
//! Sources are tried tier by tier until one yields content:
//!
//! 1. two primary sources, order picked per call by an injected coin flip
//! 2. feed sources in declared order
//! 3. the cyclic cached-message source
//! 4. the safe default, which cannot fail
//!
//! Every attempt is bounded by `source_timeout`; a timeout counts as unavailable.

use crate::content::ContentItem;
use crate::sources::{ContentSource, SafeDefaultSource};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returns `true` to try the second primary source first
pub type ChoiceFn = Arc<dyn Fn() -> bool + Send + Sync>;

pub struct ContentRetriever {
    primaries: Vec<Arc<dyn ContentSource>>,
    feeds: Vec<Arc<dyn ContentSource>>,
    cache: Option<Arc<dyn ContentSource>>,
    safe_default: SafeDefaultSource,
    choose: ChoiceFn,
    source_timeout: Duration,
}

impl ContentRetriever {
    /// A retriever with only the safe default configured
    pub fn new() -> Self {
        Self {
            primaries: Vec::new(),
            feeds: Vec::new(),
            cache: None,
            safe_default: SafeDefaultSource::default(),
            choose: Arc::new(|| rand::thread_rng().gen_bool(0.5)),
            source_timeout: Duration::from_secs(15),
        }
    }

    /// Primary tier. Only the first two entries take part in the random ordering;
    /// any further entries follow them in declared order.
    pub fn with_primaries(mut self, sources: Vec<Arc<dyn ContentSource>>) -> Self {
        self.primaries = sources;
        self
    }

    pub fn with_feeds(mut self, sources: Vec<Arc<dyn ContentSource>>) -> Self {
        self.feeds = sources;
        self
    }

    pub fn with_cache(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.cache = Some(source);
        self
    }

    pub fn with_safe_default(mut self, source: SafeDefaultSource) -> Self {
        self.safe_default = source;
        self
    }

    /// Replace the coin flip, e.g. with a constant for deterministic ordering
    pub fn with_choice(mut self, choose: ChoiceFn) -> Self {
        self.choose = choose;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Sources in the order this call will try them, safe default excluded
    fn attempt_order(&self) -> Vec<Arc<dyn ContentSource>> {
        let mut order: Vec<Arc<dyn ContentSource>> =
            Vec::with_capacity(self.primaries.len() + self.feeds.len() + 1);
        order.extend(self.primaries.iter().cloned());
        if order.len() >= 2 && (self.choose)() {
            order.swap(0, 1);
        }
        order.extend(self.feeds.iter().cloned());
        if let Some(cache) = &self.cache {
            order.push(cache.clone());
        }
        order
    }

    /// First available content in tier order. Never fails.
    pub async fn retrieve(&self) -> ContentItem {
        for source in self.attempt_order() {
            let label = source.label().to_string();
            debug!(target: "retriever", source = %label, "Trying content source");

            match tokio::time::timeout(self.source_timeout, source.fetch()).await {
                Ok(Ok(item)) => {
                    info!(
                        target: "retriever",
                        source = %item.source_label(),
                        chars = item.text().chars().count(),
                        "Content retrieved"
                    );
                    return item;
                }
                Ok(Err(unavailable)) => {
                    warn!(target: "retriever", source = %label, reason = %unavailable.reason, "Source unavailable");
                }
                Err(_) => {
                    warn!(
                        target: "retriever",
                        source = %label,
                        timeout_ms = self.source_timeout.as_millis() as u64,
                        "Source timed out"
                    );
                }
            }
        }

        warn!(target: "retriever", "All content sources unavailable; using safe default");
        self.safe_default.get()
    }
}

impl Default for ContentRetriever {
    fn default() -> Self {
        Self::new()
    }
}
