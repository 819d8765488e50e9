//! Subscription to a server-tracked retrieval job's event stream.
//!
//! The store pushes named events over a long-lived channel: `connected`,
//! `heartbeat`, and exactly one of `completed` / `failed` / `timeout`. The
//! subscription guarantees its observer sees at most one terminal outcome no
//! matter how the stream behaves, and that the transport is released on
//! every terminal path — remote terminal event, local timeout, stream
//! close, and consumer-initiated unsubscribe.

use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::retrieval::client::RetrievalClient;

/// Terminal state of a job. Exactly one is ever delivered per subscription.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed {
        answer: String,
        citations: Vec<String>,
    },
    Failed {
        error: String,
    },
    TimedOut {
        error: String,
    },
}

/// Consumer-side callbacks. Heartbeats stop once a terminal outcome has been
/// delivered.
pub trait JobObserver: Send + Sync {
    fn on_heartbeat(&self, _elapsed_secs: u64) {}
    fn on_terminal(&self, outcome: JobOutcome);
}

/// Handle to one open job stream. Dropping it (or calling
/// [`JobSubscription::unsubscribe`]) closes the transport and silences all
/// future callbacks, even if the remote side later emits one.
pub struct JobSubscription {
    job_id: String,
    cancel: CancellationToken,
    terminal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl JobSubscription {
    /// Open the stream and start delivering events to `observer`. If no
    /// terminal event arrives within `timeout`, the observer gets
    /// [`JobOutcome::TimedOut`] and the stream is dropped.
    pub fn open(
        client: Arc<RetrievalClient>,
        job_id: String,
        observer: Arc<dyn JobObserver>,
        timeout: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let terminal = Arc::new(AtomicBool::new(false));

        let worker = StreamWorker {
            client,
            job_id: job_id.clone(),
            observer,
            cancel: cancel.clone(),
            terminal: Arc::clone(&terminal),
        };
        let handle = tokio::spawn(worker.run(timeout));

        Self {
            job_id,
            cancel,
            terminal,
            handle: Some(handle),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Whether a terminal outcome has been delivered (or the subscription
    /// was torn down).
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    /// Close the transport and silence every future callback, including the
    /// terminal one.
    pub fn unsubscribe(mut self) {
        self.tear_down();
    }

    fn tear_down(&mut self) {
        self.terminal.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            drop(handle);
        }
    }
}

impl Drop for JobSubscription {
    fn drop(&mut self) {
        self.tear_down();
    }
}

struct StreamWorker {
    client: Arc<RetrievalClient>,
    job_id: String,
    observer: Arc<dyn JobObserver>,
    cancel: CancellationToken,
    terminal: Arc<AtomicBool>,
}

impl StreamWorker {
    async fn run(self, timeout: Duration) {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let response = tokio::select! {
            opened = self.client.open_job_stream(&self.job_id) => match opened {
                Ok(response) => response,
                Err(err) => {
                    self.finish(JobOutcome::Failed {
                        error: format!("job stream failed to open: {err}"),
                    });
                    return;
                }
            },
            _ = self.cancel.cancelled() => return,
            _ = &mut deadline => {
                self.finish(JobOutcome::TimedOut {
                    error: format!("no response from job {} within {timeout:?}", self.job_id),
                });
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut framer = SseFramer::default();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    // Unsubscribed: terminal flag already set by the handle.
                    return;
                }
                _ = &mut deadline => {
                    self.finish(JobOutcome::TimedOut {
                        error: format!("job {} exceeded {timeout:?}", self.job_id),
                    });
                    return;
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for event in framer.push(&bytes) {
                            if self.dispatch(event) {
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        // Transport hiccup on a still-open channel is
                        // retryable noise.
                        debug!(job_id = %self.job_id, error = %err, "job stream noise");
                    }
                    None => {
                        self.finish(JobOutcome::Failed {
                            error: "job stream closed before a terminal event".into(),
                        });
                        return;
                    }
                }
            }
        }
    }

    /// Deliver one parsed event. Returns true when the subscription is done.
    fn dispatch(&self, event: SseEvent) -> bool {
        if self.terminal.load(Ordering::SeqCst) {
            return true;
        }

        match event.name.as_str() {
            "connected" => {
                debug!(job_id = %self.job_id, "job stream connected");
                false
            }
            "heartbeat" => {
                let elapsed = serde_json::from_str::<HeartbeatData>(&event.data)
                    .map(|hb| hb.elapsed)
                    .unwrap_or(0);
                self.observer.on_heartbeat(elapsed);
                false
            }
            "completed" => {
                match serde_json::from_str::<CompletedData>(&event.data) {
                    Ok(data) => self.finish(JobOutcome::Completed {
                        answer: data.answer,
                        citations: data.citations,
                    }),
                    Err(err) => self.finish(JobOutcome::Failed {
                        error: format!("malformed completion payload: {err}"),
                    }),
                }
                true
            }
            "failed" => {
                let error = serde_json::from_str::<ErrorData>(&event.data)
                    .map(|e| e.error)
                    .unwrap_or_else(|_| "job failed".into());
                self.finish(JobOutcome::Failed { error });
                true
            }
            "timeout" => {
                let error = serde_json::from_str::<ErrorData>(&event.data)
                    .map(|e| e.error)
                    .unwrap_or_else(|_| "job timed out".into());
                self.finish(JobOutcome::TimedOut { error });
                true
            }
            // Error-type events on a channel that is still open are noise.
            "error" => {
                warn!(job_id = %self.job_id, data = %event.data, "job stream error event");
                false
            }
            other => {
                debug!(job_id = %self.job_id, event = other, "unrecognized job event");
                false
            }
        }
    }

    /// Terminal delivery, at most once per subscription.
    fn finish(&self, outcome: JobOutcome) {
        if !self.terminal.swap(true, Ordering::SeqCst) {
            self.observer.on_terminal(outcome);
        }
        self.cancel.cancel();
    }
}

#[derive(Debug, serde::Deserialize)]
struct HeartbeatData {
    #[serde(default)]
    elapsed: u64,
}

#[derive(Debug, serde::Deserialize)]
struct CompletedData {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorData {
    #[serde(default)]
    error: String,
}

/// One named server-push event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    name: String,
    data: String,
}

/// Incremental `event:` / `data:` line framing over arbitrary byte chunks.
#[derive(Default)]
struct SseFramer {
    line_buffer: String,
    current_event: Option<String>,
    current_data: String,
}

impl SseFramer {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        let fragment = String::from_utf8_lossy(bytes);
        self.line_buffer.push_str(&fragment);

        while let Some(pos) = self.line_buffer.find('\n') {
            let line = self.line_buffer[..pos].trim_end_matches('\r').to_string();
            self.line_buffer.drain(..=pos);

            if line.is_empty() {
                if let Some(name) = self.current_event.take() {
                    events.push(SseEvent {
                        name,
                        data: std::mem::take(&mut self.current_data),
                    });
                } else {
                    self.current_data.clear();
                }
                continue;
            }

            if let Some(name) = line.strip_prefix("event:") {
                self.current_event = Some(name.trim().to_string());
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                if !self.current_data.is_empty() {
                    self.current_data.push('\n');
                }
                self.current_data.push_str(data.trim());
            }
        }

        events
    }
}
