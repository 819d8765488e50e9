//! Session-scoped wiring of the whole pipeline.
//!
//! One [`SessionContext`] per observed page, owning the capture scheduler,
//! the typing monitor, and any liveness watchdogs. The host forwards its
//! events (interaction, input, visibility) here, and tears the session down
//! with [`SessionContext::end`] — nothing in the pipeline lives in global
//! state, so repeated sessions can't leak into each other.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::activity::ActivitySignal;
use crate::capture::scheduler::CaptureScheduler;
use crate::capture::sink::CaptureSink;
use crate::capture::PageSource;
use crate::config::MnemaConfig;
use crate::inject::{HostField, Injector};
use crate::retrieval::client::{RetrievalClient, StoreRetriever};
use crate::retrieval::typing::TypingMonitor;
use crate::retrieval::Retriever;
use crate::watchdog::Watchdog;

/// Owns the capture-and-injection pipeline for one session.
pub struct SessionContext {
    session_id: String,
    signal: ActivitySignal,
    scheduler: CaptureScheduler,
    typing: TypingMonitor,
    watchdogs: Vec<Watchdog>,
}

impl SessionContext {
    /// Wire the pipeline from config and the host's three seams, and start
    /// the capture loop.
    pub fn start(
        config: &MnemaConfig,
        source: Arc<dyn PageSource>,
        sink: Arc<dyn CaptureSink>,
        field: Arc<dyn HostField>,
    ) -> Self {
        let client = Arc::new(RetrievalClient::new(&config.retrieval));
        let retriever: Arc<dyn Retriever> =
            Arc::new(StoreRetriever::new(client, config.jobs.clone()));
        Self::start_with_retriever(config, source, sink, field, retriever)
    }

    /// Same wiring with a caller-supplied retriever (tests, alternate
    /// stores).
    pub fn start_with_retriever(
        config: &MnemaConfig,
        source: Arc<dyn PageSource>,
        sink: Arc<dyn CaptureSink>,
        field: Arc<dyn HostField>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let signal = ActivitySignal::new();

        let scheduler = CaptureScheduler::new(
            config.capture.clone(),
            signal.clone(),
            source,
            sink,
            session_id.clone(),
        );
        scheduler.start();

        let injector = Arc::new(Injector::new(Arc::clone(&field)));
        let typing = TypingMonitor::new(field, retriever, injector, config.retrieval.clone());

        info!(%session_id, "session started");
        Self {
            session_id,
            signal,
            scheduler,
            typing,
            watchdogs: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Host hook: any user interaction (pointer, key, scroll, focus).
    pub fn mark_activity(&self) {
        self.signal.mark();
    }

    /// Host hook: an input-affecting event on the monitored field.
    pub fn on_input(&self) {
        self.typing.on_input();
    }

    /// Host hook: page became visible/focused or hidden/blurred.
    pub fn set_visible(&self, visible: bool) {
        self.scheduler.set_visible(visible);
        if visible {
            self.signal.mark();
        }
    }

    /// Keep a host-side handle alive: `is_alive` is re-asserted every
    /// `period` and `revive` recreates the handle on loss.
    pub fn guard_presence<A, R>(&mut self, period: Duration, is_alive: A, revive: R)
    where
        A: Fn() -> bool + Send + 'static,
        R: Fn() + Send + 'static,
    {
        self.watchdogs.push(Watchdog::spawn(period, is_alive, revive));
    }

    /// Tear the session down: stop the capture loop, abort any armed
    /// debounce, and stop all watchdogs.
    pub async fn end(self) {
        self.scheduler.stop().await;
        self.typing.cancel();
        for watchdog in self.watchdogs {
            watchdog.stop().await;
        }
        info!(session_id = %self.session_id, "session ended");
    }
}
