//! Capability doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use phis_core::capabilities::{
    AudioHandle, Broadcaster, CapabilityError, CapabilityResult, DeliveryReport, Notifier,
    Synthesizer, Translator,
};
use phis_core::sources::{ContentSource, Unavailable};
use phis_core::{ContentItem, ContentOrigin};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MALARIA_EN: &str = "Malaria kills thousands yearly. Sleep under an insecticide-treated \
net every night and get tested at a clinic as soon as a fever starts.";

/// `n` distinct Hausa-looking words
pub fn hausa_words(n: usize) -> String {
    const WORDS: &[&str] = &["zazzabin", "cizon", "sauro", "yana", "kashe", "mutane", "da", "yawa"];
    (0..n)
        .map(|i| format!("{}{}", WORDS[i % WORDS.len()], i / WORDS.len()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Always yields the same text; counts fetches
pub struct StaticSource {
    pub label: String,
    pub text: String,
    pub origin: ContentOrigin,
    pub calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(label: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            text: text.into(),
            origin: ContentOrigin::Web,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<ContentItem, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ContentItem::new(self.text.as_str(), self.label.as_str(), self.origin)
            .ok_or_else(|| Unavailable::new(&self.label, "empty"))
    }
}

/// Never has content; counts fetches
pub struct DownSource {
    pub label: String,
    pub calls: Arc<AtomicUsize>,
}

impl DownSource {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for DownSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<ContentItem, Unavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Unavailable::new(&self.label, "offline"))
    }
}

/// Hangs far longer than any test timeout
pub struct HangingSource;

#[async_trait]
impl ContentSource for HangingSource {
    fn label(&self) -> &str {
        "HANGING"
    }

    async fn fetch(&self) -> Result<ContentItem, Unavailable> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(Unavailable::new("HANGING", "unreachable"))
    }
}

pub enum TranslatorMode {
    Healthy,
    Echo,
    Fail,
}

pub struct CountingTranslator {
    pub mode: TranslatorMode,
    pub calls: AtomicUsize,
}

impl CountingTranslator {
    pub fn new(mode: TranslatorMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for CountingTranslator {
    async fn translate(&self, text: &str) -> CapabilityResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            TranslatorMode::Healthy => Ok(hausa_words(30)),
            TranslatorMode::Echo => Ok(text.to_string()),
            TranslatorMode::Fail => Err(CapabilityError::Transient("model overloaded".into())),
        }
    }
}

pub struct CountingSynthesizer {
    pub audio: Option<AudioHandle>,
    pub calls: AtomicUsize,
}

impl CountingSynthesizer {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            audio: Some(AudioHandle::new(
                "/tmp/phis/audio/test.wav",
                64_000,
                Duration::from_secs(4),
            )),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, _text: &str) -> CapabilityResult<AudioHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audio
            .clone()
            .ok_or_else(|| CapabilityError::Transient("engine crashed".into()))
    }
}

/// Records every broadcast text and whether audio was attached
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub sent: Mutex<Vec<(String, bool)>>,
    /// Time spent sending, after subscribers are known
    pub delay: Option<Duration>,
    /// Time spent looking up subscribers
    pub resolve_delay: Option<Duration>,
    pub fail: bool,
}

impl RecordingBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(String, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn resolve_subscribers(&self) -> CapabilityResult<Vec<String>> {
        if let Some(delay) = self.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(vec!["whatsapp:+2348000000001".into(), "whatsapp:+2348000000002".into()])
    }

    async fn broadcast(
        &self,
        text: &str,
        audio: Option<&AudioHandle>,
    ) -> CapabilityResult<DeliveryReport> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CapabilityError::Transient("gateway down".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), audio.is_some()));
        Ok(DeliveryReport {
            attempted: 2,
            delivered: 2,
            failures: vec![],
        })
    }
}

/// Records direct messages as (recipient, text)
#[derive(Default)]
pub struct RecordingNotifier {
    pub notes: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().unwrap().clone()
    }

    /// Poll until `n` messages arrived or five seconds passed
    pub async fn wait_for(&self, n: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            if self.notes.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.notes()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, to: &str, text: &str) -> CapabilityResult<()> {
        self.notes
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}
