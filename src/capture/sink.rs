//! Outbound capture messages and the transport seam they leave through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// One capture, addressed to the background coordinator.
///
/// Fire-and-forget: no response is awaited for correctness, failures are
/// logged by the scheduler and never surfaced to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureMessage {
    pub url: String,
    pub title: String,
    /// Leading slice of the content, for listing UIs.
    pub content_snippet: String,
    pub full_content: String,
    pub timestamp: DateTime<Utc>,
    pub page_metadata: PageMetadata,
}

/// Context stamped onto every capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Session this capture belongs to.
    pub session_id: String,
    /// Activity level at capture time (`"high"`, `"normal"`, `"low"`).
    pub activity_level: String,
    /// Word count of the full content.
    pub word_count: usize,
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The coordinator side of the channel is gone or saturated.
    #[error("capture channel unavailable: {0}")]
    ChannelClosed(String),
    /// Any other transport-level failure.
    #[error("capture transport failed: {0}")]
    Transport(String),
}

/// Transport seam for captures. Implementations must not block the capture
/// loop beyond a single send attempt.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn send(&self, message: CaptureMessage) -> Result<(), SinkError>;
}

/// Built-in sink: asynchronous message passing to an in-process coordinator
/// over a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<CaptureMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiving end the coordinator drains.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<CaptureMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl CaptureSink for ChannelSink {
    async fn send(&self, message: CaptureMessage) -> Result<(), SinkError> {
        // try_send, not send: a stalled coordinator must never back-pressure
        // the capture loop into the host page.
        self.tx
            .try_send(message)
            .map_err(|err| SinkError::ChannelClosed(err.to_string()))
    }
}
