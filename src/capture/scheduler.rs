//! The adaptive capture loop.
//!
//! A self-tuning poll: each cycle re-reads the activity level and sleeps for
//! the interval that level implies, so the loop speeds up while the user is
//! busy and backs off when they go quiet. A tick captures only when activity
//! has been seen since the last reset, the minimum inter-capture spacing has
//! elapsed, and the content either changed meaningfully or has sat unchanged
//! in front of an idle reader long enough.
//!
//! `start` replaces any prior loop instead of stacking a second timer;
//! `stop` cancels cooperatively (in-flight tick finishes, future ticks
//! don't happen). Page visibility drives the same transitions.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::activity::{ActivityLevel, ActivitySignal};
use crate::capture::change::ChangeDetector;
use crate::capture::sink::{CaptureMessage, CaptureSink, PageMetadata};
use crate::capture::snapshot::ContentSnapshot;
use crate::capture::PageSource;
use crate::config::CaptureConfig;

/// Owns the capture loop for one observed page.
pub struct CaptureScheduler {
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

struct Run {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    config: CaptureConfig,
    signal: ActivitySignal,
    detector: ChangeDetector,
    source: Arc<dyn PageSource>,
    sink: Arc<dyn CaptureSink>,
    session_id: String,
    visible: AtomicBool,
    state: Mutex<CaptureState>,
}

#[derive(Default)]
struct CaptureState {
    last_capture_at: Option<Instant>,
    /// The single retained "last" snapshot, overwritten every tick the
    /// detector runs.
    last_snapshot: Option<ContentSnapshot>,
    /// When the currently-displayed content was first observed.
    content_seen_at: Option<Instant>,
}

impl CaptureScheduler {
    pub fn new(
        config: CaptureConfig,
        signal: ActivitySignal,
        source: Arc<dyn PageSource>,
        sink: Arc<dyn CaptureSink>,
        session_id: String,
    ) -> Self {
        let detector = ChangeDetector::new(config.similarity_floor);
        Self {
            shared: Arc::new(Shared {
                config,
                signal,
                detector,
                source,
                sink,
                session_id,
                visible: AtomicBool::new(true),
                state: Mutex::new(CaptureState::default()),
            }),
            run: Mutex::new(None),
        }
    }

    /// Start the loop. If a loop is already running it is cancelled and
    /// replaced, never doubled.
    pub fn start(&self) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(Arc::clone(&self.shared), cancel.clone()));

        let mut guard = self.run.lock().expect("scheduler lock poisoned");
        if let Some(previous) = guard.take() {
            previous.cancel.cancel();
            debug!("capture loop replaced");
        }
        *guard = Some(Run { cancel, handle });
    }

    /// Cancel future ticks and wait for the loop task to wind down.
    pub async fn stop(&self) {
        let run = self.run.lock().expect("scheduler lock poisoned").take();
        if let Some(run) = run {
            run.cancel.cancel();
            let _ = run.handle.await;
        }
    }

    /// Visibility hook: a hidden page stops the loop, a visible one restarts
    /// it. Backpressure against capturing content nobody is looking at.
    pub fn set_visible(&self, visible: bool) {
        self.shared.visible.store(visible, Ordering::SeqCst);
        if visible {
            self.start();
        } else {
            self.halt();
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.lock().expect("scheduler lock poisoned").is_some()
    }

    /// Cancel without awaiting the task (used from sync contexts).
    fn halt(&self) {
        if let Some(run) = self.run.lock().expect("scheduler lock poisoned").take() {
            run.cancel.cancel();
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Interval implied by an activity level.
fn poll_interval(config: &CaptureConfig, level: ActivityLevel) -> Duration {
    let ms = match level {
        ActivityLevel::High => config.poll_high_ms,
        ActivityLevel::Normal => config.poll_normal_ms,
        ActivityLevel::Low => config.poll_low_ms,
    };
    Duration::from_millis(ms)
}

async fn capture_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        // Recomputed every cycle: the sleep that follows is always the one
        // the current activity level implies.
        let interval = poll_interval(&shared.config, shared.signal.level());

        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                tick(&shared).await;
            }
            _ = cancel.cancelled() => {
                debug!("capture loop shutting down");
                break;
            }
        }
    }
}

async fn tick(shared: &Shared) {
    if !shared.visible.load(Ordering::SeqCst) {
        return;
    }

    let Some(view) = shared.source.observe() else {
        debug!("page not observable, skipping tick");
        return;
    };

    let now = Instant::now();
    let snapshot = ContentSnapshot::from_view(&view, Utc::now());

    let decision = {
        let mut state = shared.state.lock().expect("capture state lock poisoned");

        let changed = match &state.last_snapshot {
            Some(previous) => shared.detector.has_changed(previous, &snapshot),
            // First observation: blank-to-populated always counts.
            None => true,
        };
        if changed || state.content_seen_at.is_none() {
            state.content_seen_at = Some(now);
        }

        let dwelled = !changed
            && state
                .content_seen_at
                .is_some_and(|seen| now.duration_since(seen) >= shared.config.idle_dwell());

        let spaced = state
            .last_capture_at
            .is_none_or(|at| now.duration_since(at) >= shared.config.min_capture_spacing());

        let should = shared.signal.seen_since_reset() && spaced && (changed || dwelled);
        if should {
            state.last_capture_at = Some(now);
            // A capture consumes the dwell; unchanged content re-arms it.
            state.content_seen_at = Some(now);
        }
        state.last_snapshot = Some(snapshot.clone());
        should
    };

    if !decision {
        return;
    }

    let message = build_message(shared, &snapshot);
    // Fire and forget. A failed send is logged and swallowed; the next
    // attempt is the next natural tick, never sooner.
    if let Err(err) = shared.sink.send(message).await {
        warn!(url = %snapshot.url, error = %err, "capture send failed");
    } else {
        debug!(url = %snapshot.url, "captured");
    }

    shared.signal.reset();
}

fn build_message(shared: &Shared, snapshot: &ContentSnapshot) -> CaptureMessage {
    let snippet: String = snapshot
        .text
        .chars()
        .take(shared.config.snippet_chars)
        .collect();

    CaptureMessage {
        url: snapshot.url.clone(),
        title: snapshot.title.clone(),
        content_snippet: snippet,
        full_content: snapshot.text.clone(),
        timestamp: snapshot.captured_at,
        page_metadata: PageMetadata {
            session_id: shared.session_id.clone(),
            activity_level: shared.signal.level().as_str().to_string(),
            word_count: snapshot.text.split_whitespace().count(),
        },
    }
}
