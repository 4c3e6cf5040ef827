mod config;
mod http;
mod schedule;

use chrono::Utc;
use config::AgentConfig;
use phis_audio::LocalTts;
use phis_core::delivery::TwilioBroadcaster;
use phis_core::inbound::InboundHandler;
use phis_core::llm::{LlmClient, LlmTranslator};
use phis_core::sources::{
    CachedMessageSource, CursorStore, FeedSource, SafeDefaultSource, WebPageSource,
};
use phis_core::subscribers::JsonSubscriberStore;
use phis_core::{
    telemetry, BroadcastService, ContentRetriever, ContentSource, Orchestrator,
    OrchestratorConfig,
};
use schedule::Schedule;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();
    telemetry::init_tracing("info,phis_core=info,phis_audio=info,broadcast_agent=info");

    info!(
        target: "broadcast_agent",
        "Starting broadcast agent: Content → Translate → QA → TTS → QA → Deliver"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = AgentConfig::load();

    let store = Arc::new(JsonSubscriberStore::open(cfg.subscribers_path.clone()).await?);
    let retriever = Arc::new(build_retriever(&cfg).await);

    let translator = LlmTranslator::new(LlmClient::new(cfg.llm.clone())?, cfg.language.clone());

    tokio::fs::create_dir_all(&cfg.tts.audio_dir).await?;
    let tts = Arc::new(LocalTts::new(cfg.tts.clone()));

    if !cfg.twilio.has_credentials() {
        warn!(target: "broadcast_agent", "Twilio credentials missing; every delivery will fail");
    }
    let broadcaster = Arc::new(TwilioBroadcaster::new(cfg.twilio.clone(), store.clone())?);

    let orchestrator = Orchestrator::new(retriever, broadcaster.clone())
        .with_translator(Arc::new(translator))
        .with_synthesizer(tts.clone())
        .with_translation_qa(cfg.translation_qa.clone())
        .with_audio_qa(cfg.audio_qa.clone())
        .with_config(OrchestratorConfig {
            timeouts: cfg.timeouts.clone(),
            layout: cfg.layout.clone(),
        });
    let service = Arc::new(BroadcastService::new(orchestrator));
    let handler = Arc::new(
        InboundHandler::new(store.clone(), Arc::clone(&service)).with_notifier(broadcaster),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!(target: "broadcast_agent", schedule = %cfg.schedule.describe(), "Scheduler armed");
    let scheduler = tokio::spawn(run_scheduler(
        Arc::clone(&service),
        Arc::clone(&tts),
        cfg.schedule,
        cfg.audio_retention,
        shutdown_rx.clone(),
    ));

    let app = http::router(handler, tts.audio_dir());
    let mut server_rx = shutdown_rx;
    let server = tokio::spawn(http::serve(app, cfg.port, async move {
        let _ = server_rx.changed().await;
    }));

    signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!(target: "broadcast_agent", "Shutting down...");

    let _ = shutdown_tx.send(true);
    // refuses new runs and waits for an in-flight broadcast
    service.shutdown().await;

    if let Err(e) = scheduler.await {
        error!(target: "broadcast_agent", error = %e, "Scheduler task failed");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(target: "broadcast_agent", error = %e, "HTTP server error"),
        Err(e) => error!(target: "broadcast_agent", error = %e, "HTTP server task failed"),
    }
    Ok(())
}

async fn build_retriever(cfg: &AgentConfig) -> ContentRetriever {
    let sources = &cfg.sources;
    let primaries = sources
        .primaries
        .iter()
        .cloned()
        .map(|c| {
            Arc::new(WebPageSource::new(c, sources.extraction.clone(), &sources.http))
                as Arc<dyn ContentSource>
        })
        .collect();
    let feeds = sources
        .feeds
        .iter()
        .cloned()
        .map(|c| {
            Arc::new(FeedSource::new(c, sources.extraction.clone(), &sources.http))
                as Arc<dyn ContentSource>
        })
        .collect();

    let mut retriever = ContentRetriever::new()
        .with_primaries(primaries)
        .with_feeds(feeds)
        .with_safe_default(SafeDefaultSource::new(sources.safe_default.as_deref()))
        .with_source_timeout(sources.source_timeout);

    let cursor = CursorStore::load(cfg.cache.cursor_path.clone()).await;
    match CachedMessageSource::from_json_file(&cfg.cache.messages_path, cursor).await {
        Ok(cache) => retriever = retriever.with_cache(Arc::new(cache)),
        Err(e) => {
            warn!(target: "broadcast_agent", error = %e, "Cached messages unavailable; cache tier disabled")
        }
    }
    retriever
}

async fn run_scheduler(
    service: Arc<BroadcastService>,
    tts: Arc<LocalTts>,
    schedule: Schedule,
    audio_retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let delay = schedule.delay_from(Utc::now());
        info!(target: "broadcast_agent", in_secs = delay.as_secs(), "Next scheduled broadcast");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }

        let outcome = service.run_scheduled().await;
        if !outcome.success() {
            warn!(
                target: "broadcast_agent",
                stage = %outcome.stage_reached(),
                reason = outcome.failure_reason().unwrap_or(""),
                "Scheduled broadcast aborted"
            );
        }

        match tts.prune_older_than(audio_retention).await {
            Ok(0) => {}
            Ok(n) => info!(target: "broadcast_agent", removed = n, "Pruned old audio"),
            Err(e) => warn!(target: "broadcast_agent", error = %e, "Audio prune failed"),
        }

        if service.is_closing() {
            break;
        }
    }
    info!(target: "broadcast_agent", "Scheduler stopped");
}
