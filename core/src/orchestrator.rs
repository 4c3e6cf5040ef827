//! Broadcast pipeline state machine.
//!
//! ```text
//! Idle -> ContentReady -> Translated -> TranslationValidated
//!      -> Synthesized -> AudioValidated -> Delivered
//! ```
//!
//! Any state may fall into `Aborted`. Translation (including its QA gate) gets
//! `TRANSLATION_ATTEMPTS` tries in total; synthesis, audio QA and delivery get one.
//! Absent capabilities skip their stage.

use crate::capabilities::{with_timeout, AudioHandle, Broadcaster, Synthesizer, Translator};
use crate::content::{BroadcastOutcome, BroadcastRequest, ContentOrigin, Stage};
use crate::delivery::{compose_broadcast_text, MessageLayout};
use crate::retriever::ContentRetriever;
use crate::validator::{AudioQa, TranslationQa};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Translator calls per broadcast, shared between call failures and QA rejections
pub const TRANSLATION_ATTEMPTS: u32 = 2;

/// Upper bound on external calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTimeouts {
    pub translate: Duration,
    pub synthesize: Duration,
    /// Bounds subscriber resolution only; a started fan-out is never cut short
    pub deliver: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            translate: Duration::from_secs(60),
            synthesize: Duration::from_secs(120),
            deliver: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub timeouts: StageTimeouts,
    pub layout: MessageLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Idle,
    ContentReady,
    Translated,
    TranslationValidated,
    Synthesized,
    AudioValidated,
    Delivered,
    Aborted,
}

/// Per-invocation artifacts; created and dropped inside `process`
struct PipelineState {
    step: PipelineStep,
    english: String,
    source_label: String,
    origin: ContentOrigin,
    translated: Option<String>,
    audio: Option<AudioHandle>,
    translation_attempts: u32,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            step: PipelineStep::Idle,
            english: String::new(),
            source_label: String::new(),
            origin: ContentOrigin::User,
            translated: None,
            audio: None,
            translation_attempts: 0,
        }
    }

    fn advance(&mut self, next: PipelineStep) {
        debug!(target: "orchestrator", from = ?self.step, to = ?next, "Pipeline transition");
        self.step = next;
    }
}

struct Abort {
    stage: Stage,
    reason: String,
}

impl Abort {
    fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

type StepResult = std::result::Result<(), Abort>;

pub struct Orchestrator {
    retriever: Arc<ContentRetriever>,
    translator: Option<Arc<dyn Translator>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    translation_qa: Option<TranslationQa>,
    audio_qa: Option<AudioQa>,
    broadcaster: Arc<dyn Broadcaster>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Minimal pipeline: content straight to delivery
    pub fn new(retriever: Arc<ContentRetriever>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            retriever,
            translator: None,
            synthesizer: None,
            translation_qa: None,
            audio_qa: None,
            broadcaster,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_translation_qa(mut self, qa: TranslationQa) -> Self {
        self.translation_qa = Some(qa);
        self
    }

    pub fn with_audio_qa(mut self, qa: AudioQa) -> Self {
        self.audio_qa = Some(qa);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// A scheduled request built from the retriever's content
    pub async fn scheduled_request(&self) -> BroadcastRequest {
        BroadcastRequest::scheduled(self.retriever.retrieve().await)
    }

    /// Run one broadcast to completion. Never panics on capability failure;
    /// every failure ends up in the outcome.
    pub async fn process(&self, request: BroadcastRequest) -> BroadcastOutcome {
        let started = Instant::now();
        let trigger = request.trigger;
        let mut state = PipelineState::new();

        match self.run(&mut state, request).await {
            Ok(()) => {
                info!(
                    target: "orchestrator",
                    trigger = ?trigger,
                    source = %state.source_label,
                    translation_attempts = state.translation_attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Broadcast delivered"
                );
                BroadcastOutcome::delivered()
            }
            Err(abort) => {
                state.advance(PipelineStep::Aborted);
                warn!(
                    target: "orchestrator",
                    trigger = ?trigger,
                    stage = %abort.stage,
                    reason = %abort.reason,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Broadcast aborted"
                );
                BroadcastOutcome::aborted(abort.stage, abort.reason)
            }
        }
    }

    async fn run(&self, state: &mut PipelineState, request: BroadcastRequest) -> StepResult {
        self.prepare_content(state, request).await;
        self.translate(state).await?;
        self.synthesize(state).await?;
        self.check_audio(state)?;
        self.deliver(state).await
    }

    async fn prepare_content(&self, state: &mut PipelineState, request: BroadcastRequest) {
        if request.has_text() {
            state.english = request.english_text.trim().to_string();
            state.source_label = request.source_label;
            state.origin = request.origin;
        } else {
            let item = self.retriever.retrieve().await;
            state.english = item.text().to_string();
            state.source_label = item.source_label().to_string();
            state.origin = item.origin();
        }
        state.advance(PipelineStep::ContentReady);
    }

    async fn translate(&self, state: &mut PipelineState) -> StepResult {
        let Some(translator) = &self.translator else {
            debug!(target: "orchestrator", "No translator configured; skipping translation");
            state.advance(PipelineStep::Translated);
            state.advance(PipelineStep::TranslationValidated);
            return Ok(());
        };

        let mut last = Abort::new(Stage::Translation, "not attempted");
        while state.translation_attempts < TRANSLATION_ATTEMPTS {
            state.translation_attempts += 1;
            let attempt = state.translation_attempts;

            let translated = match with_timeout(
                self.config.timeouts.translate,
                translator.translate(&state.english),
            )
            .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(target: "orchestrator", stage = "translation", attempt, error = %e, "Translation failed");
                    let retryable = e.is_retryable();
                    last = Abort::new(Stage::Translation, e.to_string());
                    if !retryable {
                        break;
                    }
                    continue;
                }
            };
            state.advance(PipelineStep::Translated);

            match self.validate_translation(state, &translated) {
                Ok(()) => {
                    state.translated = Some(translated);
                    state.advance(PipelineStep::TranslationValidated);
                    return Ok(());
                }
                Err(reason) => {
                    warn!(target: "orchestrator", stage = "translation-qa", attempt, reason = %reason, "Translation rejected");
                    last = Abort::new(Stage::TranslationQa, reason);
                    state.advance(PipelineStep::ContentReady);
                }
            }
        }
        Err(last)
    }

    fn validate_translation(&self, state: &PipelineState, translated: &str) -> Result<(), String> {
        let Some(qa) = &self.translation_qa else {
            return Ok(());
        };
        if state.origin == ContentOrigin::SafeDefault {
            debug!(target: "orchestrator", "Safe default content; translation QA skipped");
            return Ok(());
        }
        qa.validate(&state.english, translated)
            .map_err(|v| v.to_string())
    }

    async fn synthesize(&self, state: &mut PipelineState) -> StepResult {
        let Some(synthesizer) = &self.synthesizer else {
            debug!(target: "orchestrator", "No synthesizer configured; text-only broadcast");
            state.advance(PipelineStep::Synthesized);
            return Ok(());
        };

        let text = state.translated.as_deref().unwrap_or(&state.english);
        let audio = with_timeout(self.config.timeouts.synthesize, synthesizer.synthesize(text))
            .await
            .map_err(|e| Abort::new(Stage::Synthesis, e.to_string()))?;
        debug!(
            target: "orchestrator",
            path = ?audio.path(),
            bytes = audio.byte_size(),
            duration_ms = audio.duration().as_millis() as u64,
            "Audio synthesized"
        );
        state.audio = Some(audio);
        state.advance(PipelineStep::Synthesized);
        Ok(())
    }

    fn check_audio(&self, state: &mut PipelineState) -> StepResult {
        match (&self.audio_qa, &self.synthesizer) {
            (Some(qa), Some(_)) => {
                qa.validate(state.audio.as_ref())
                    .map_err(|v| Abort::new(Stage::AudioQa, v.to_string()))?;
            }
            _ => debug!(target: "orchestrator", "Audio QA skipped"),
        }
        state.advance(PipelineStep::AudioValidated);
        Ok(())
    }

    async fn deliver(&self, state: &mut PipelineState) -> StepResult {
        let text = compose_broadcast_text(
            &self.config.layout,
            &state.english,
            &state.source_label,
            state.translated.as_deref(),
        );
        let recipients = with_timeout(
            self.config.timeouts.deliver,
            self.broadcaster.resolve_subscribers(),
        )
        .await
        .map_err(|e| Abort::new(Stage::Delivery, e.to_string()))?;
        debug!(target: "orchestrator", recipients = recipients.len(), "Subscribers resolved");

        // Once sends start the fan-out runs to completion; each send is bounded
        // by the broadcaster itself.
        let report = self
            .broadcaster
            .broadcast(&text, state.audio.as_ref())
            .await
            .map_err(|e| Abort::new(Stage::Delivery, e.to_string()))?;

        if report.all_failed() {
            return Err(Abort::new(
                Stage::Delivery,
                format!("all {} sends failed", report.attempted),
            ));
        }
        if report.attempted == 0 {
            warn!(target: "orchestrator", "No active subscribers; nothing sent");
        } else if !report.failures.is_empty() {
            warn!(
                target: "orchestrator",
                delivered = report.delivered,
                failed = report.failures.len(),
                "Partial delivery"
            );
        }
        state.advance(PipelineStep::Delivered);
        Ok(())
    }
}
