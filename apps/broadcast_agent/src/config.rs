use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use phis_audio::TtsConfig;
use phis_core::delivery::{MessageLayout, TwilioConfig};
use phis_core::llm::LlmClientConfig;
use phis_core::sources::feed::FeedConfig;
use phis_core::sources::http::HttpSourceConfig;
use phis_core::sources::web::WebPageConfig;
use phis_core::{AudioQa, ExtractionRules, StageTimeouts, TranslationQa};

use crate::schedule::Schedule;

/// Everything the broadcast agent needs to wire its pipeline
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub port: u16,
    pub schedule: Schedule,
    /// Target language handed to the translator
    pub language: String,
    pub layout: MessageLayout,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub subscribers_path: PathBuf,
    pub translation_qa: TranslationQa,
    pub audio_qa: AudioQa,
    pub timeouts: StageTimeouts,
    /// Synthesized files older than this are pruned after each scheduled run
    pub audio_retention: Duration,
    pub llm: LlmClientConfig,
    pub tts: TtsConfig,
    pub twilio: TwilioConfig,
}

#[derive(Clone, Debug)]
pub struct SourcesConfig {
    /// First two entries are the pair the retriever picks between at random
    pub primaries: Vec<WebPageConfig>,
    pub feeds: Vec<FeedConfig>,
    pub http: HttpSourceConfig,
    pub extraction: ExtractionRules,
    pub source_timeout: Duration,
    /// Replaces the built-in last-resort advisory when set
    pub safe_default: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub messages_path: PathBuf,
    pub cursor_path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primaries: vec![
                WebPageConfig {
                    label: "WHO".into(),
                    url: "https://www.who.int/news-room/fact-sheets/detail/malaria".into(),
                    selector: "article p".into(),
                },
                WebPageConfig {
                    label: "CDC".into(),
                    url: "https://www.cdc.gov/malaria/about/index.html".into(),
                    selector: "main p".into(),
                },
            ],
            feeds: vec![FeedConfig {
                label: "WHO-NEWS".into(),
                url: "https://www.who.int/rss-feeds/news-english.xml".into(),
                keyword: Some("malaria".into()),
            }],
            http: HttpSourceConfig::default(),
            extraction: ExtractionRules::default(),
            source_timeout: Duration::from_secs(15),
            safe_default: std::env::var("PHIS_SAFE_DEFAULT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            messages_path: std::env::var("PHIS_MESSAGES")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("messages.json")),
            cursor_path: std::env::var("PHIS_CURSOR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("last_sent.json")),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let schedule = match std::env::var("BROADCAST_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            Some(minutes) if minutes > 0 => Schedule::Interval { minutes },
            _ => Schedule::default(),
        };

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5000),
            schedule,
            language: std::env::var("PHIS_LANGUAGE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Hausa".to_string()),
            layout: MessageLayout::default(),
            sources: SourcesConfig::default(),
            cache: CacheConfig::default(),
            subscribers_path: std::env::var("PHIS_SUBSCRIBERS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("subscribers.json")),
            translation_qa: TranslationQa::default(),
            audio_qa: AudioQa::default(),
            timeouts: StageTimeouts::default(),
            audio_retention: Duration::from_secs(24 * 3600),
            llm: LlmClientConfig::default(),
            tts: TtsConfig::default(),
            twilio: TwilioConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file (path via PHIS_AGENT_CONFIG or ./broadcast_agent.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path =
            std::env::var("PHIS_AGENT_CONFIG").unwrap_or_else(|_| "broadcast_agent.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "broadcast_agent", path = ?path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "broadcast_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "broadcast_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    fn from_toml_str(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        let overlay = toml::from_str::<AgentToml>(s)?;
        Ok(overlay.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AgentToml {
    pub port: Option<u16>,
    pub language: Option<String>,
    pub subscribers_path: Option<PathBuf>,
    pub audio_retention_hours: Option<u64>,
    pub schedule: Option<Schedule>,
    pub layout: Option<LayoutToml>,
    pub sources: Option<SourcesToml>,
    pub cache: Option<CacheToml>,
    pub qa: Option<QaToml>,
    pub timeouts: Option<TimeoutsToml>,
    pub llm: Option<LlmToml>,
    pub tts: Option<TtsToml>,
    pub twilio: Option<TwilioToml>,
}

impl AgentToml {
    fn overlay(self, mut base: AgentConfig) -> AgentConfig {
        if let Some(x) = self.port {
            base.port = x;
        }
        if let Some(x) = self.language {
            base.language = x;
        }
        if let Some(x) = self.subscribers_path {
            base.subscribers_path = x;
        }
        if let Some(x) = self.audio_retention_hours {
            base.audio_retention = Duration::from_secs(x * 3600);
        }
        if let Some(x) = self.schedule {
            base.schedule = x;
        }
        if let Some(l) = self.layout {
            l.apply(&mut base.layout);
        }
        if let Some(s) = self.sources {
            s.apply(&mut base.sources);
        }
        if let Some(c) = self.cache {
            c.apply(&mut base.cache);
        }
        if let Some(q) = self.qa {
            q.apply(&mut base.translation_qa, &mut base.audio_qa);
        }
        if let Some(t) = self.timeouts {
            t.apply(&mut base.timeouts);
        }
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        if let Some(t) = self.tts {
            t.apply(&mut base.tts);
        }
        if let Some(t) = self.twilio {
            t.apply(&mut base.twilio);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LayoutToml {
    pub app_name: Option<String>,
    pub language_tag: Option<String>,
}
impl LayoutToml {
    fn apply(self, l: &mut MessageLayout) {
        if let Some(x) = self.app_name {
            l.app_name = x;
        }
        if let Some(x) = self.language_tag {
            l.language_tag = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SourcesToml {
    pub primaries: Option<Vec<WebPageConfig>>,
    pub feeds: Option<Vec<FeedConfig>>,
    pub timeout_ms: Option<u64>,
    pub http_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub min_fragment_chars: Option<usize>,
    pub max_fragments: Option<usize>,
    pub max_chars: Option<usize>,
    pub safe_default: Option<String>,
}
impl SourcesToml {
    fn apply(self, s: &mut SourcesConfig) {
        if let Some(x) = self.primaries {
            s.primaries = x;
        }
        if let Some(x) = self.feeds {
            s.feeds = x;
        }
        if let Some(x) = self.timeout_ms {
            s.source_timeout = Duration::from_millis(x);
        }
        if let Some(x) = self.http_timeout_ms {
            s.http.timeout_ms = x;
        }
        if let Some(x) = self.user_agent {
            s.http.user_agent = x;
        }
        if let Some(x) = self.min_fragment_chars {
            s.extraction.min_fragment_chars = x;
        }
        if let Some(x) = self.max_fragments {
            s.extraction.max_fragments = x.max(1);
        }
        if let Some(x) = self.max_chars {
            s.extraction.max_chars = x.max(1);
        }
        if let Some(x) = self.safe_default.filter(|m| !m.trim().is_empty()) {
            s.safe_default = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CacheToml {
    pub messages_path: Option<PathBuf>,
    pub cursor_path: Option<PathBuf>,
}
impl CacheToml {
    fn apply(self, c: &mut CacheConfig) {
        if let Some(x) = self.messages_path {
            c.messages_path = x;
        }
        if let Some(x) = self.cursor_path {
            c.cursor_path = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct QaToml {
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
    pub min_audio_bytes: Option<u64>,
    pub min_audio_secs: Option<f64>,
}
impl QaToml {
    fn apply(self, t: &mut TranslationQa, a: &mut AudioQa) {
        if let Some(x) = self.min_words {
            t.min_words = x;
        }
        if let Some(x) = self.max_words {
            t.max_words = x;
        }
        if t.max_words < t.min_words {
            t.max_words = t.min_words;
        }
        if let Some(x) = self.min_audio_bytes {
            a.min_bytes = x;
        }
        if let Some(x) = self.min_audio_secs {
            a.min_duration_secs = x.max(0.0);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TimeoutsToml {
    pub translate_secs: Option<u64>,
    pub synthesize_secs: Option<u64>,
    pub deliver_secs: Option<u64>,
}
impl TimeoutsToml {
    fn apply(self, t: &mut StageTimeouts) {
        if let Some(x) = self.translate_secs {
            t.translate = Duration::from_secs(x);
        }
        if let Some(x) = self.synthesize_secs {
            t.synthesize = Duration::from_secs(x);
        }
        if let Some(x) = self.deliver_secs {
            t.deliver = Duration::from_secs(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(x) = self.base_url {
            l.base_url = x;
        }
        if let Some(x) = self.model {
            l.model = x;
        }
        if let Some(x) = self.api_key {
            l.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            l.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            l.temperature = x;
        }
        if let Some(x) = self.max_output_tokens {
            l.max_output_tokens = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsToml {
    pub audio_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub rate: Option<f32>,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    pub espeak_voice: Option<String>,
    pub ffmpeg_bin: Option<PathBuf>,
    pub transcode_mp3: Option<bool>,
}
impl TtsToml {
    fn apply(self, t: &mut TtsConfig) {
        if let Some(x) = self.audio_dir {
            t.audio_dir = x;
        }
        if let Some(x) = self.timeout_ms {
            t.timeout_ms = x;
        }
        if let Some(x) = self.sample_rate {
            t.sample_rate = x;
        }
        if let Some(x) = self.rate {
            t.rate = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.piper_bin {
            t.piper_bin = Some(x);
        }
        if let Some(x) = self.piper_voice {
            t.piper_voice = Some(x);
        }
        if let Some(x) = self.espeak_bin {
            t.espeak_bin = Some(x);
        }
        if let Some(x) = self.espeak_voice {
            t.espeak_voice = Some(x);
        }
        if let Some(x) = self.ffmpeg_bin {
            t.ffmpeg_bin = Some(x);
        }
        if let Some(x) = self.transcode_mp3 {
            t.transcode_mp3 = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TwilioToml {
    pub from_number: Option<String>,
    pub public_url: Option<String>,
    pub api_base: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl TwilioToml {
    fn apply(self, t: &mut TwilioConfig) {
        if let Some(x) = self.from_number {
            t.from_number = x;
        }
        if let Some(x) = self.public_url {
            t.public_url = x;
        }
        if let Some(x) = self.api_base {
            t.api_base = x;
        }
        if let Some(x) = self.request_timeout_ms {
            t.request_timeout_ms = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_only_touches_given_fields() {
        let base = AgentConfig::default();
        let cfg = AgentConfig::from_toml_str(
            r#"
port = 8088
language = "Yoruba"

[layout]
language_tag = "YO"

[qa]
min_words = 10

[timeouts]
translate_secs = 5
"#,
            base.clone(),
        )
        .unwrap();

        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.language, "Yoruba");
        assert_eq!(cfg.layout.language_tag, "YO");
        assert_eq!(cfg.layout.app_name, base.layout.app_name);
        assert_eq!(cfg.translation_qa.min_words, 10);
        assert_eq!(cfg.translation_qa.max_words, base.translation_qa.max_words);
        assert_eq!(cfg.timeouts.translate, Duration::from_secs(5));
        assert_eq!(cfg.timeouts.deliver, base.timeouts.deliver);
        assert_eq!(cfg.sources.primaries.len(), base.sources.primaries.len());
    }

    #[test]
    fn test_schedule_and_sources_tables() {
        let cfg = AgentConfig::from_toml_str(
            r#"
[schedule]
kind = "interval"
minutes = 7

[sources]
max_chars = 300

[[sources.primaries]]
label = "MOH"
url = "https://example.org/malaria"

[[sources.feeds]]
label = "FEED"
url = "https://example.org/rss"
keyword = "fever"
"#,
            AgentConfig::default(),
        )
        .unwrap();

        assert_eq!(cfg.schedule, Schedule::Interval { minutes: 7 });
        assert_eq!(cfg.sources.extraction.max_chars, 300);
        assert_eq!(cfg.sources.primaries.len(), 1);
        assert_eq!(cfg.sources.primaries[0].selector, "p");
        assert_eq!(cfg.sources.feeds[0].keyword.as_deref(), Some("fever"));
    }

    #[test]
    fn test_inverted_word_bounds_are_repaired() {
        let cfg = AgentConfig::from_toml_str(
            "[qa]\nmin_words = 50\nmax_words = 10\n",
            AgentConfig::default(),
        )
        .unwrap();
        assert_eq!(cfg.translation_qa.min_words, 50);
        assert_eq!(cfg.translation_qa.max_words, 50);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broadcast_agent.toml");
        fs::write(&path, "port = \"not a number\"").unwrap();
        let cfg = AgentConfig::load_from(&path);
        assert_eq!(cfg.port, AgentConfig::default().port);

        let missing = AgentConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(missing.language, AgentConfig::default().language);
    }
}
