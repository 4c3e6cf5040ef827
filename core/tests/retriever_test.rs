/// Integration tests for the tiered content retriever
mod common;

use common::{DownSource, HangingSource, StaticSource};
use phis_core::retriever::ContentRetriever;
use phis_core::sources::fallback::{SAFE_DEFAULT_LABEL, SAFE_DEFAULT_MESSAGE};
use phis_core::sources::{CachedMessage, CachedMessageSource, ContentSource, CursorStore};
use phis_core::ContentOrigin;
use std::sync::Arc;
use std::time::Duration;

fn fixed_choice(swap: bool) -> Arc<dyn Fn() -> bool + Send + Sync> {
    Arc::new(move || swap)
}

fn cache(messages: &[(&str, &str)]) -> Arc<CachedMessageSource> {
    let messages = messages
        .iter()
        .map(|(m, s)| CachedMessage {
            message: m.to_string(),
            source: s.to_string(),
        })
        .collect();
    Arc::new(CachedMessageSource::new(messages, CursorStore::in_memory(0)))
}

mod totality {
    use super::*;

    #[tokio::test]
    async fn test_empty_retriever_returns_safe_default() {
        let item = ContentRetriever::new().retrieve().await;
        assert_eq!(item.text(), SAFE_DEFAULT_MESSAGE);
        assert_eq!(item.source_label(), SAFE_DEFAULT_LABEL);
        assert_eq!(item.origin(), ContentOrigin::SafeDefault);
    }

    #[tokio::test]
    async fn test_every_availability_combination_yields_content() {
        // bit i set => tier source i is up (primary a, primary b, feed, cache)
        for mask in 0u8..16 {
            let src = |bit: u8, label: &str| -> Arc<dyn ContentSource> {
                if mask & (1 << bit) != 0 {
                    StaticSource::new(label, "Sleep under a treated mosquito net every night.")
                        as Arc<dyn ContentSource>
                } else {
                    DownSource::new(label) as Arc<dyn ContentSource>
                }
            };
            let retriever = ContentRetriever::new()
                .with_primaries(vec![src(0, "WHO"), src(1, "CDC")])
                .with_feeds(vec![src(2, "RSS")])
                .with_cache(src(3, "CACHE"))
                .with_choice(fixed_choice(mask % 2 == 0));

            let item = retriever.retrieve().await;
            assert!(!item.text().trim().is_empty(), "mask {mask:04b}");
            if mask == 0 {
                assert_eq!(item.source_label(), SAFE_DEFAULT_LABEL);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let feed = StaticSource::new("RSS", "Rainy season raises malaria risk; clear standing water.");
        let retriever = ContentRetriever::new()
            .with_primaries(vec![Arc::new(HangingSource)])
            .with_feeds(vec![feed.clone()])
            .with_source_timeout(Duration::from_secs(2));

        let item = retriever.retrieve().await;
        assert_eq!(item.source_label(), "RSS");
        assert_eq!(feed.calls(), 1);
    }
}

mod ordering {
    use super::*;

    #[tokio::test]
    async fn test_choice_picks_first_primary() {
        let who = StaticSource::new("WHO", "WHO advisory text about malaria prevention.");
        let cdc = StaticSource::new("CDC", "CDC advisory text about malaria prevention.");

        let keep = ContentRetriever::new()
            .with_primaries(vec![who.clone(), cdc.clone()])
            .with_choice(fixed_choice(false));
        assert_eq!(keep.retrieve().await.source_label(), "WHO");

        let swap = ContentRetriever::new()
            .with_primaries(vec![who.clone(), cdc.clone()])
            .with_choice(fixed_choice(true));
        assert_eq!(swap.retrieve().await.source_label(), "CDC");

        assert_eq!(who.calls(), 1);
        assert_eq!(cdc.calls(), 1);
    }

    #[tokio::test]
    async fn test_other_primary_is_fallback() {
        let down = DownSource::new("WHO");
        let up = StaticSource::new("CDC", "CDC advisory text about malaria prevention.");
        let retriever = ContentRetriever::new()
            .with_primaries(vec![down.clone(), up.clone()])
            .with_choice(fixed_choice(false));

        assert_eq!(retriever.retrieve().await.source_label(), "CDC");
        assert_eq!(down.calls(), 1);
    }

    #[tokio::test]
    async fn test_feeds_tried_in_declared_order() {
        let first = DownSource::new("FEED-1");
        let second = StaticSource::new("FEED-2", "Second feed advisory on malaria.");
        let third = StaticSource::new("FEED-3", "Third feed advisory on malaria.");
        let retriever = ContentRetriever::new()
            .with_primaries(vec![DownSource::new("WHO"), DownSource::new("CDC")])
            .with_feeds(vec![first.clone(), second.clone(), third.clone()]);

        let item = retriever.retrieve().await;
        assert_eq!(item.source_label(), "FEED-2");
        assert_eq!(first.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_tier_cycles_when_network_is_down() {
        let retriever = ContentRetriever::new()
            .with_primaries(vec![DownSource::new("WHO"), DownSource::new("CDC")])
            .with_feeds(vec![DownSource::new("RSS")])
            .with_cache(cache(&[
                ("Use a net every night.", "WHO"),
                ("Test before you treat.", "CDC"),
            ]));

        let labels: Vec<String> = [
            retriever.retrieve().await,
            retriever.retrieve().await,
            retriever.retrieve().await,
        ]
        .iter()
        .map(|c| c.source_label().to_string())
        .collect();
        assert_eq!(labels, vec!["CACHE-WHO", "CACHE-CDC", "CACHE-WHO"]);
    }

    #[tokio::test]
    async fn test_random_choice_uses_both_primaries() {
        let who = StaticSource::new("WHO", "WHO advisory text about malaria prevention.");
        let cdc = StaticSource::new("CDC", "CDC advisory text about malaria prevention.");
        let retriever = ContentRetriever::new().with_primaries(vec![who.clone(), cdc.clone()]);

        for _ in 0..200 {
            retriever.retrieve().await;
        }
        assert_eq!(who.calls() + cdc.calls(), 200);
        assert!(who.calls() > 0 && cdc.calls() > 0);
    }
}
