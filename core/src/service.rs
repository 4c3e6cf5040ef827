//! Serialized entry points for scheduled and user-triggered broadcasts.
//!
//! Timer and webhook may fire at the same time; a single async mutex ensures
//! only one pipeline (and so one cursor advance) runs at a time.

use crate::content::{BroadcastOutcome, BroadcastRequest, Stage};
use crate::orchestrator::Orchestrator;
use crate::telemetry::BroadcastStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

pub struct BroadcastService {
    orchestrator: Orchestrator,
    gate: Mutex<()>,
    closing: AtomicBool,
    stats: BroadcastStats,
}

impl BroadcastService {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            gate: Mutex::new(()),
            closing: AtomicBool::new(false),
            stats: BroadcastStats::new(),
        }
    }

    /// Scheduled broadcast of retrieved content
    pub async fn run_scheduled(&self) -> BroadcastOutcome {
        let Some(_guard) = self.enter().await else {
            return Self::refused();
        };
        let request = self.orchestrator.scheduled_request().await;
        info!(target: "service", source = %request.source_label, "Scheduled broadcast starting");
        self.execute(request).await
    }

    /// User-submitted broadcast
    pub async fn run_user(&self, text: &str, source_label: &str) -> BroadcastOutcome {
        let Some(_guard) = self.enter().await else {
            return Self::refused();
        };
        info!(target: "service", source = %source_label, "User broadcast starting");
        self.execute(BroadcastRequest::user(text, source_label)).await
    }

    pub async fn auto_broadcast(&self) -> bool {
        self.run_scheduled().await.success()
    }

    pub async fn process_message(&self, text: &str, source_label: &str) -> bool {
        self.run_user(text, source_label).await.success()
    }

    /// Refuse new runs and wait for the in-flight one to finish
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let _guard = self.gate.lock().await;
        info!(target: "service", "Broadcast service stopped");
        self.stats.log_summary();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    async fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        if self.is_closing() {
            return None;
        }
        let guard = self.gate.lock().await;
        // shutdown may have started while we waited
        if self.is_closing() {
            return None;
        }
        Some(guard)
    }

    fn refused() -> BroadcastOutcome {
        warn!(target: "service", "Broadcast refused; service shutting down");
        BroadcastOutcome::aborted(Stage::Content, "service shutting down")
    }

    async fn execute(&self, request: BroadcastRequest) -> BroadcastOutcome {
        let started = Instant::now();
        let outcome = self.orchestrator.process(request).await;
        self.stats.record(&outcome, started.elapsed());
        outcome
    }
}
