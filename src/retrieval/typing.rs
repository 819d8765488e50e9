//! Debounced retrieval triggered by the user typing into the monitored
//! field.
//!
//! Every input event re-arms a quiet-period timer (last-write-wins: the old
//! timer is aborted, never stacked). When the field has settled, the text is
//! long enough, and it isn't something we already retrieved for, the query
//! is dispatched — carrying its own text as the race-detection token the
//! injector re-validates against on completion.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::inject::{HostField, Injector, InjectionResult, INJECTION_MARKER};
use crate::retrieval::{RetrievalError, Retriever};

/// Watches one input field and turns settled edits into retrievals.
pub struct TypingMonitor {
    field: Arc<dyn HostField>,
    retriever: Arc<dyn Retriever>,
    injector: Arc<Injector>,
    config: RetrievalConfig,
    state: Arc<Mutex<TypingState>>,
}

#[derive(Default)]
struct TypingState {
    debounce: Option<JoinHandle<()>>,
    /// The last text a retrieval was actually dispatched for.
    last_retrieved: Option<String>,
}

impl TypingMonitor {
    pub fn new(
        field: Arc<dyn HostField>,
        retriever: Arc<dyn Retriever>,
        injector: Arc<Injector>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            field,
            retriever,
            injector,
            config,
            state: Arc::new(Mutex::new(TypingState::default())),
        }
    }

    /// Host hook: call on every input-affecting event on the monitored field.
    pub fn on_input(&self) {
        let Some(text) = self.field.read_text() else {
            return;
        };

        // Our own injected content must never re-trigger retrieval.
        if text.contains(INJECTION_MARKER) {
            return;
        }

        let cycle = DebounceCycle {
            field: Arc::clone(&self.field),
            retriever: Arc::clone(&self.retriever),
            injector: Arc::clone(&self.injector),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        };

        let mut state = self.state.lock().expect("typing state poisoned");
        if let Some(previous) = state.debounce.take() {
            previous.abort();
        }
        state.debounce = Some(tokio::spawn(cycle.run(text)));
    }

    /// Abort any armed debounce timer. Used at session teardown.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("typing state poisoned");
        if let Some(handle) = state.debounce.take() {
            handle.abort();
        }
    }
}

impl Drop for TypingMonitor {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct DebounceCycle {
    field: Arc<dyn HostField>,
    retriever: Arc<dyn Retriever>,
    injector: Arc<Injector>,
    config: RetrievalConfig,
    state: Arc<Mutex<TypingState>>,
}

impl DebounceCycle {
    async fn run(self, armed_text: String) {
        tokio::time::sleep(self.config.debounce()).await;

        let Some(live) = self.field.read_text() else {
            warn!("monitored field disappeared during debounce");
            return;
        };

        // The burst didn't settle on what armed us; a newer cycle owns it.
        if live != armed_text {
            return;
        }

        if live.chars().count() < self.config.min_query_len {
            return;
        }

        {
            let mut state = self.state.lock().expect("typing state poisoned");
            if state.last_retrieved.as_deref() == Some(live.as_str()) {
                return;
            }
            state.last_retrieved = Some(live.clone());
        }

        self.injector.arm(&live);
        debug!(len = live.len(), "dispatching retrieval");

        match self.retriever.retrieve(&live).await {
            Ok(Some(context)) => {
                let result = self.injector.complete(&live, &context);
                match result {
                    InjectionResult::Applied => debug!("context injected"),
                    other => debug!(outcome = ?other, "retrieval result not applied"),
                }
            }
            Ok(None) => {
                debug!("no relevant context for query");
                self.injector.disarm(&live);
            }
            Err(RetrievalError::AuthRequired) => {
                // Already diagnosed once by the client; abandon quietly.
                self.injector.disarm(&live);
            }
            Err(err) => {
                debug!(error = %err, "retrieval failed, skipping cycle");
                self.injector.disarm(&live);
            }
        }
    }
}
