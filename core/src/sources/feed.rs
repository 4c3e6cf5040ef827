//! RSS / Atom feed content source
//!
//! Reads `<item>` (RSS 2.0) or `<entry>` (Atom) elements, takes the title and
//! description/summary of each, strips embedded HTML and condenses the result
//! with `ExtractionRules`. An optional keyword keeps only matching items.
use super::http::{build_client, fetch_text, HttpSourceConfig};
use super::{collapse_whitespace, ContentSource, ExtractionRules, Unavailable};
use crate::content::{ContentItem, ContentOrigin};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::Html;
use serde::{Deserialize, Serialize};

/// Configuration for one feed source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub label: String,
    pub url: String,
    /// Case-insensitive filter applied to title + summary
    #[serde(default)]
    pub keyword: Option<String>,
}

/// One parsed feed entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub summary: String,
}

impl FeedEntry {
    fn as_fragment(&self) -> String {
        match (self.title.is_empty(), self.summary.is_empty()) {
            (false, false) => format!("{}. {}", self.title.trim_end_matches('.'), self.summary),
            (false, true) => self.title.clone(),
            _ => self.summary.clone(),
        }
    }
}

pub struct FeedSource {
    config: FeedConfig,
    rules: ExtractionRules,
    http_client: reqwest::Client,
}

impl FeedSource {
    pub fn new(config: FeedConfig, rules: ExtractionRules, http: &HttpSourceConfig) -> Self {
        Self {
            config,
            rules,
            http_client: build_client(http),
        }
    }

    /// Condense a feed document into advisory text
    pub fn extract(&self, xml: &str) -> Result<String, String> {
        let entries = parse_feed(xml)?;
        let keyword = self.config.keyword.as_deref().map(str::to_lowercase);
        let fragments = entries
            .iter()
            .filter(|e| match &keyword {
                Some(k) => e.as_fragment().to_lowercase().contains(k.as_str()),
                None => true,
            })
            .map(FeedEntry::as_fragment);
        self.rules
            .apply(fragments)
            .ok_or_else(|| "no feed entries above threshold".to_string())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Title,
    Summary,
}

/// Parse RSS 2.0 or Atom into entries, in document order
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => current = Some(FeedEntry::default()),
                b"title" if current.is_some() => field = Field::Title,
                b"description" | b"summary" | b"content" if current.is_some() => {
                    field = Field::Summary
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    field = Field::None;
                }
                b"title" | b"description" | b"summary" | b"content" => field = Field::None,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                push_text(current.as_mut(), field, &text);
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                push_text(current.as_mut(), field, &String::from_utf8_lossy(&raw));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "feed parse error at {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn push_text(entry: Option<&mut FeedEntry>, field: Field, text: &str) {
    let Some(entry) = entry else {
        return;
    };
    let target = match field {
        Field::Title => &mut entry.title,
        Field::Summary => &mut entry.summary,
        Field::None => return,
    };
    let plain = strip_html(text);
    if plain.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(&plain);
}

/// Feed summaries often carry escaped HTML; keep only the text nodes
fn strip_html(text: &str) -> String {
    if !text.contains('<') {
        return collapse_whitespace(text);
    }
    let fragment = Html::parse_fragment(text);
    let plain: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&plain)
}

#[async_trait]
impl ContentSource for FeedSource {
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
        ContentItem::new(text, &self.config.label, ContentOrigin::Feed)
            .ok_or_else(|| Unavailable::new(&self.config.label, "empty text"))
    }
}
