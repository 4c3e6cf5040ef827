use super::{ContentSource, Unavailable};
use crate::content::{ContentItem, ContentOrigin};
use async_trait::async_trait;

pub const SAFE_DEFAULT_LABEL: &str = "PHIS-DEFAULT";

pub const SAFE_DEFAULT_MESSAGE: &str = "Malaria is preventable and treatable. Sleep under an \
insecticide-treated mosquito net every night, clear standing water around your home, and visit \
the nearest health facility for a test as soon as anyone in your family has a fever. Early \
treatment saves lives.";

/// Terminal source of the fallback chain; always yields content.
pub struct SafeDefaultSource {
    item: ContentItem,
}

impl SafeDefaultSource {
    /// Uses `message` when it has text, the built-in advisory otherwise.
    pub fn new(message: Option<&str>) -> Self {
        let item = message
            .and_then(|m| ContentItem::new(m, SAFE_DEFAULT_LABEL, ContentOrigin::SafeDefault))
            .unwrap_or_else(Self::builtin);
        Self { item }
    }

    fn builtin() -> ContentItem {
        ContentItem::constant(SAFE_DEFAULT_MESSAGE, SAFE_DEFAULT_LABEL, ContentOrigin::SafeDefault)
    }

    /// Infallible read, refreshed timestamp on every call
    pub fn get(&self) -> ContentItem {
        ContentItem::new(self.item.text(), SAFE_DEFAULT_LABEL, ContentOrigin::SafeDefault)
            .unwrap_or_else(|| self.item.clone())
    }
}

impl Default for SafeDefaultSource {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ContentSource for SafeDefaultSource {
    fn label(&self) -> &str {
        SAFE_DEFAULT_LABEL
    }

    async fn fetch(&self) -> Result<ContentItem, Unavailable> {
        Ok(self.get())
    }
}
