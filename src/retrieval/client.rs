//! Bearer-authenticated HTTP client for the memory store's search endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{JobConfig, RetrievalConfig};
use crate::retrieval::job::{JobObserver, JobOutcome, JobSubscription};
use crate::retrieval::{MemoryHit, RetrievalError, RetrievalReply, Retriever};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
    #[serde(rename = "contextOnly")]
    context_only: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<MemoryHit>,
    #[serde(default)]
    job_id: Option<String>,
}

/// HTTP client for `/search` and the per-job event streams.
pub struct RetrievalClient {
    http: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
    limit: usize,
    context_only: bool,
    /// Auth failures are diagnosed once per client, then silenced — no
    /// retry loop against an endpoint that will keep saying no.
    auth_warned: AtomicBool,
}

impl RetrievalClient {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            limit: config.limit,
            context_only: config.context_only,
            auth_warned: AtomicBool::new(false),
        }
    }

    /// One search round trip: inline answer/results, or a job id.
    pub async fn search(&self, query: &str) -> Result<RetrievalReply, RetrievalError> {
        let token = self.require_token()?;

        let response = self
            .http
            .post(format!("{}/search", self.endpoint))
            .bearer_auth(token)
            .json(&SearchRequest {
                query,
                limit: self.limit,
                context_only: self.context_only,
            })
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            self.warn_auth_once();
            return Err(RetrievalError::AuthRequired);
        }
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|err| RetrievalError::InvalidResponse(err.to_string()))?;

        if let Some(job_id) = parsed.job_id {
            debug!(%job_id, "search became an async job");
            return Ok(RetrievalReply::Job { job_id });
        }
        Ok(RetrievalReply::Inline {
            answer: parsed.answer,
            results: parsed.results,
        })
    }

    /// Open the server-push event stream for a job.
    pub(crate) async fn open_job_stream(
        &self,
        job_id: &str,
    ) -> Result<reqwest::Response, RetrievalError> {
        let token = self.require_token()?;

        let response = self
            .http
            .get(format!("{}/jobs/{job_id}/stream", self.endpoint))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            self.warn_auth_once();
            return Err(RetrievalError::AuthRequired);
        }
        if !status.is_success() {
            return Err(RetrievalError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn require_token(&self) -> Result<&str, RetrievalError> {
        match self.api_token.as_deref() {
            Some(token) => Ok(token),
            None => {
                self.warn_auth_once();
                Err(RetrievalError::AuthRequired)
            }
        }
    }

    fn warn_auth_once(&self) {
        if !self.auth_warned.swap(true, Ordering::SeqCst) {
            warn!("memory store rejected credentials; set MNEMA_TOKEN to enable retrieval");
        }
    }
}

/// Production [`Retriever`]: searches inline, and follows async jobs to
/// their terminal outcome over the event stream.
pub struct StoreRetriever {
    client: Arc<RetrievalClient>,
    jobs: JobConfig,
    /// One live subscription per call site; a new job tears down the old
    /// stream before opening its own.
    subscription: Mutex<Option<JobSubscription>>,
}

impl StoreRetriever {
    pub fn new(client: Arc<RetrievalClient>, jobs: JobConfig) -> Self {
        Self {
            client,
            jobs,
            subscription: Mutex::new(None),
        }
    }

    async fn follow_job(&self, job_id: String) -> Result<Option<String>, RetrievalError> {
        let (tx, rx) = oneshot::channel();
        let observer = Arc::new(OneshotObserver {
            tx: Mutex::new(Some(tx)),
        });

        let subscription = JobSubscription::open(
            Arc::clone(&self.client),
            job_id,
            observer,
            self.jobs.timeout(),
        );

        {
            let mut slot = self.subscription.lock().expect("job slot poisoned");
            if let Some(previous) = slot.replace(subscription) {
                previous.unsubscribe();
            }
        }

        match rx.await {
            Ok(JobOutcome::Completed { answer, .. }) => {
                if answer.trim().is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(answer))
                }
            }
            Ok(JobOutcome::Failed { error }) | Ok(JobOutcome::TimedOut { error }) => {
                Err(RetrievalError::Job(error))
            }
            // Sender dropped without an outcome: a newer job replaced us.
            Err(_) => Err(RetrievalError::Superseded),
        }
    }
}

#[async_trait]
impl Retriever for StoreRetriever {
    async fn retrieve(&self, query: &str) -> Result<Option<String>, RetrievalError> {
        match self.client.search(query).await? {
            reply @ RetrievalReply::Inline { .. } => Ok(reply.context_text()),
            RetrievalReply::Job { job_id } => self.follow_job(job_id).await,
        }
    }
}

/// Relays the single terminal outcome into a oneshot.
struct OneshotObserver {
    tx: Mutex<Option<oneshot::Sender<JobOutcome>>>,
}

impl JobObserver for OneshotObserver {
    fn on_terminal(&self, outcome: JobOutcome) {
        if let Some(tx) = self.tx.lock().expect("observer lock poisoned").take() {
            let _ = tx.send(outcome);
        }
    }
}
