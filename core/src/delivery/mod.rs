//! Delivery: broadcast message composition and the WhatsApp transport.

pub mod twilio;

pub use twilio::{TwilioBroadcaster, TwilioConfig};

use serde::{Deserialize, Serialize};

const LANG_SEPARATOR_WIDTH: usize = 80;

/// Fixed framing around every broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLayout {
    pub app_name: String,
    /// Two-letter tag shown before the translated section, e.g. `HA`
    pub language_tag: String,
}

impl Default for MessageLayout {
    fn default() -> Self {
        Self {
            app_name: "🌍MalariaPHIS-Hausa".to_string(),
            language_tag: "HA".to_string(),
        }
    }
}

impl MessageLayout {
    fn banner(&self) -> String {
        let rule = "=".repeat(20);
        format!("{rule} \n  _{}_ \n{rule}\n", self.app_name)
    }
}

/// Banner, English section with attribution and, when there is one, the translated section.
pub fn compose_broadcast_text(
    layout: &MessageLayout,
    english: &str,
    source_label: &str,
    translated: Option<&str>,
) -> String {
    let mut text = format!(
        "{}[EN]🇺🇸  {} _-(Source: {})_",
        layout.banner(),
        english.trim(),
        source_label
    );
    if let Some(translated) = translated.map(str::trim).filter(|t| !t.is_empty()) {
        text.push_str(&format!(
            " \n{}\n*[{}]🇳🇬  {}*",
            "_".repeat(LANG_SEPARATOR_WIDTH),
            layout.language_tag,
            translated
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_with_translation() {
        let layout = MessageLayout::default();
        let text = compose_broadcast_text(&layout, "Use bed nets.", "WHO", Some("Yi amfani da gidan sauro."));
        assert!(text.starts_with("===================="));
        assert!(text.contains("_🌍MalariaPHIS-Hausa_"));
        assert!(text.contains("[EN]🇺🇸  Use bed nets. _-(Source: WHO)_"));
        assert!(text.contains(&"_".repeat(80)));
        assert!(text.ends_with("*[HA]🇳🇬  Yi amfani da gidan sauro.*"));
    }

    #[test]
    fn test_compose_without_translation() {
        let layout = MessageLayout {
            app_name: "PHIS".into(),
            language_tag: "YO".into(),
        };
        let text = compose_broadcast_text(&layout, "Use bed nets.", "CACHE-CDC", None);
        assert!(text.ends_with("_-(Source: CACHE-CDC)_"));
        assert!(!text.contains("[YO]"));

        let blank = compose_broadcast_text(&layout, "Use bed nets.", "CDC", Some("  "));
        assert!(!blank.contains("[YO]"));
    }
}
