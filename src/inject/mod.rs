//! Race-safe injection of retrieved context into a live input field.
//!
//! A retrieval takes seconds and the user may keep typing the whole time.
//! The injector therefore never trusts the text it was dispatched with: on
//! completion it re-reads the field and only writes when the live text still
//! relates to the original query (equal, or a substring in either direction,
//! tolerating trailing edits). Anything else is a stale answer and is
//! discarded silently.
//!
//! The substring check is a heuristic: a user who deletes and retypes the
//! same text mid-flight reads as "unchanged". Tightening it would start
//! dropping legitimately-unchanged cases, so it stays.

use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Delimits injected context from the user's own text. Typing observation
/// treats any field containing this marker as our own output and stays
/// quiet, so injection can never re-trigger retrieval.
pub const INJECTION_MARKER: &str = "----- retrieved context -----";

/// Write access to the one live input field the host monitors.
///
/// Covers both plain editable fields (value assignment) and rich editable
/// regions (text content assignment); `notify_changed` fires the host's
/// native change notification so frameworks observing the field re-render.
pub trait HostField: Send + Sync {
    /// Current full text, or `None` if the field is gone.
    fn read_text(&self) -> Option<String>;

    /// Replace the field's text. `false` means the target disappeared.
    fn write_text(&self, text: &str) -> bool;

    fn notify_changed(&self);
}

/// What happened to one injection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionResult {
    /// Context was spliced into the field and the change notification fired.
    Applied,
    /// The live text no longer relates to the query; result dropped.
    StaleDiscarded,
    /// A newer query was armed while this one was in flight; result dropped.
    Superseded,
    /// No field to write into; attempt abandoned for this cycle.
    FieldMissing,
}

/// Exists only while a retrieval for `query` is in flight.
#[derive(Debug, Clone)]
struct PendingInjection {
    query: String,
    #[allow(dead_code)]
    started_at: Instant,
}

/// Owns the single pending-injection slot for one field.
pub struct Injector {
    field: Arc<dyn HostField>,
    /// At most one pending injection per field; arming overwrites, never
    /// queues.
    pending: Mutex<Option<PendingInjection>>,
}

impl Injector {
    pub fn new(field: Arc<dyn HostField>) -> Self {
        Self {
            field,
            pending: Mutex::new(None),
        }
    }

    /// Record that a retrieval for `query` was dispatched. Any older pending
    /// injection is superseded.
    pub fn arm(&self, query: &str) {
        let mut slot = self.pending.lock().expect("injection slot poisoned");
        if let Some(previous) = slot.replace(PendingInjection {
            query: query.to_string(),
            started_at: Instant::now(),
        }) {
            debug!(superseded = %previous.query, "pending injection replaced");
        }
    }

    /// Drop the pending injection for `query`, if it is still the armed one.
    pub fn disarm(&self, query: &str) {
        let mut slot = self.pending.lock().expect("injection slot poisoned");
        if slot.as_ref().is_some_and(|p| p.query == query) {
            *slot = None;
        }
    }

    /// Attempt to splice `retrieved` into the field for the retrieval that
    /// was armed with `query`.
    pub fn complete(&self, query: &str, retrieved: &str) -> InjectionResult {
        {
            let mut slot = self.pending.lock().expect("injection slot poisoned");
            match slot.as_ref() {
                Some(pending) if pending.query == query => {
                    *slot = None;
                }
                _ => return InjectionResult::Superseded,
            }
        }

        let Some(live) = self.field.read_text() else {
            warn!("no field to inject into");
            return InjectionResult::FieldMissing;
        };

        if !applicable(&live, query) {
            debug!("live text diverged from query, discarding result");
            return InjectionResult::StaleDiscarded;
        }

        let combined = format!("{retrieved}\n{INJECTION_MARKER}\n{live}");
        if !self.field.write_text(&combined) {
            warn!("field disappeared during injection");
            return InjectionResult::FieldMissing;
        }
        self.field.notify_changed();
        InjectionResult::Applied
    }
}

/// Exact equality is too strict — debounce and completion are not atomic
/// with keystrokes — so a superset/subset relationship also qualifies.
fn applicable(live: &str, query: &str) -> bool {
    live == query || live.contains(query) || query.contains(live)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicability_relations() {
        assert!(applicable("how do I", "how do I"));
        // user kept typing after dispatch
        assert!(applicable("how do I rotate keys", "how do I"));
        // user deleted a trailing fragment
        assert!(applicable("how do", "how do I"));
        // unrelated rewrite
        assert!(!applicable("completely different", "how do I"));
    }
}
