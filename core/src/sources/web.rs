//! Web page content source
//!
//! Fetches an HTML page, selects text-bearing elements with a CSS selector
//! (paragraphs by default) and condenses them with `ExtractionRules`.
use super::http::{build_client, fetch_text, HttpSourceConfig};
use super::{ContentSource, ExtractionRules, Unavailable};
use crate::content::{ContentItem, ContentOrigin};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Configuration for one web page source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPageConfig {
    pub label: String,
    pub url: String,
    #[serde(default = "default_selector")]
    pub selector: String,
}

fn default_selector() -> String {
    "p".to_string()
}

pub struct WebPageSource {
    config: WebPageConfig,
    rules: ExtractionRules,
    http_client: reqwest::Client,
}

impl WebPageSource {
    pub fn new(config: WebPageConfig, rules: ExtractionRules, http: &HttpSourceConfig) -> Self {
        Self {
            config,
            rules,
            http_client: build_client(http),
        }
    }

    /// Condense an HTML document into advisory text
    pub fn extract(&self, html: &str) -> Result<String, String> {
        extract_from_html(html, &self.config.selector, &self.rules)
    }
}

pub(crate) fn extract_from_html(
    html: &str,
    selector: &str,
    rules: &ExtractionRules,
) -> Result<String, String> {
    let selector =
        Selector::parse(selector).map_err(|e| format!("invalid selector {}: {}", selector, e))?;
    let document = Html::parse_document(html);
    let fragments = document
        .select(&selector)
        .map(|el| el.text().collect::<String>());
    rules
        .apply(fragments)
        .ok_or_else(|| "no text fragments above threshold".to_string())
}

#[async_trait]
impl ContentSource for WebPageSource {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn fetch(&self) -> Result<ContentItem, Unavailable> {
        let body = fetch_text(&self.http_client, &self.config.label, &self.config.url)
            .await
            .map_err(|reason| Unavailable::new(&self.config.label, reason))?;
        let text = self
            .extract(&body)
            .map_err(|reason| Unavailable::new(&self.config.label, reason))?;
        ContentItem::new(text, &self.config.label, ContentOrigin::Web)
            .ok_or_else(|| Unavailable::new(&self.config.label, "empty text"))
    }
}
