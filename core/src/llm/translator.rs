use super::client::LlmClient;
use crate::capabilities::{CapabilityError, CapabilityResult, Translator};
use async_trait::async_trait;
use tracing::debug;

/// English → target-language translation through an instruction-tuned model
pub struct LlmTranslator {
    client: LlmClient,
    target_language: String,
}

impl LlmTranslator {
    pub fn new(client: LlmClient, target_language: impl Into<String>) -> Self {
        Self {
            client,
            target_language: target_language.into(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    fn instructions(&self) -> String {
        format!(
            "You translate English public-health advisories into {lang}. \
             Reply with the {lang} translation only: no preamble, no notes, no English.",
            lang = self.target_language
        )
    }
}

/// Models sometimes wrap the answer in quotes or a code fence
fn clean_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|s| s.strip_suffix("```"))
        .map(|s| s.split_once('\n').map(|(_, body)| body).unwrap_or(s).trim())
        .unwrap_or(trimmed);
    unfenced
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(unfenced)
        .trim()
        .to_string()
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str) -> CapabilityResult<String> {
        let response = self.client.generate(&self.instructions(), text).await?;
        let translated = clean_output(&response.text);
        debug!(
            target: "translator",
            language = %self.target_language,
            provider = ?response.provider,
            words = translated.split_whitespace().count(),
            "Translation received"
        );
        if translated.is_empty() {
            return Err(CapabilityError::ValidationFailed("empty translation".into()));
        }
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClientConfig;

    #[test]
    fn test_clean_output() {
        assert_eq!(clean_output("  \"Sannu da zuwa\"  "), "Sannu da zuwa");
        assert_eq!(clean_output("```text\nSannu da zuwa\n```"), "Sannu da zuwa");
        assert_eq!(clean_output("```Sannu```"), "Sannu");
        assert_eq!(clean_output("Sannu"), "Sannu");
        assert_eq!(clean_output("   "), "");
    }

    #[test]
    fn test_instructions_name_language() {
        let client = LlmClient::new(LlmClientConfig::default()).unwrap();
        let translator = LlmTranslator::new(client, "Yoruba");
        assert!(translator.instructions().contains("into Yoruba"));
        assert_eq!(translator.target_language(), "Yoruba");
    }
}
