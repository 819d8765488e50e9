//! Retrieval from the memory store: the HTTP client, the debounced
//! typing trigger, and job streams for long-running queries.

pub mod client;
pub mod job;
pub mod typing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored memory returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// What the search endpoint handed back.
#[derive(Debug, Clone)]
pub enum RetrievalReply {
    /// The endpoint answered within the request.
    Inline {
        answer: Option<String>,
        results: Vec<MemoryHit>,
    },
    /// The query became a server-tracked job, completed out-of-band.
    Job { job_id: String },
}

impl RetrievalReply {
    /// Flatten an inline reply into injectable context text, if any.
    pub fn context_text(&self) -> Option<String> {
        match self {
            Self::Inline { answer, results } => {
                if let Some(answer) = answer {
                    if !answer.trim().is_empty() {
                        return Some(answer.clone());
                    }
                }
                if results.is_empty() {
                    return None;
                }
                Some(
                    results
                        .iter()
                        .map(|hit| hit.content.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                )
            }
            Self::Job { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Network-level failure. Recovered by silent skip; never retried early.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Missing or rejected credentials. Surfaced once, never hammered.
    #[error("authentication required")]
    AuthRequired,

    #[error("endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// An async job ended in failure or timed out.
    #[error("job did not complete: {0}")]
    Job(String),

    /// A newer query replaced this one while it was in flight.
    #[error("superseded by a newer query")]
    Superseded,
}

/// The seam the typing monitor retrieves through. Production wiring is
/// [`client::StoreRetriever`]; tests substitute fakes.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch injectable context for `query`. `Ok(None)` means the store had
    /// nothing relevant.
    async fn retrieve(&self, query: &str) -> Result<Option<String>, RetrievalError>;
}
