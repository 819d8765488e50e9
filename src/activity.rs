//! User-activity recency tracking.
//!
//! [`ActivitySignal`] records the timestamp of the most recent user
//! interaction (pointer, key, scroll, focus) and derives a coarse
//! [`ActivityLevel`] from how long ago that was. The level is recomputed from
//! elapsed time on demand, never stored, so two readers at the same instant
//! always agree.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Activity goes from High to Normal after this much quiet.
const HIGH_UNDER: Duration = Duration::from_secs(15);
/// Activity goes from Normal to Low after this much quiet.
const NORMAL_UNDER: Duration = Duration::from_secs(120);

/// Coarse measure of how recently the user interacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    /// Interaction within the last 15 seconds.
    High,
    /// Interaction within the last 2 minutes.
    Normal,
    /// Quiet for 2 minutes or more.
    Low,
}

impl ActivityLevel {
    /// Wire-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    /// Pure mapping from elapsed quiet time to a level.
    pub fn from_elapsed(elapsed: Duration) -> Self {
        if elapsed < HIGH_UNDER {
            Self::High
        } else if elapsed < NORMAL_UNDER {
            Self::Normal
        } else {
            Self::Low
        }
    }
}

/// Shared record of the most recent user interaction.
///
/// Cheap to clone; all clones observe the same underlying timestamp.
#[derive(Debug, Clone)]
pub struct ActivitySignal {
    inner: Arc<Mutex<SignalState>>,
}

#[derive(Debug)]
struct SignalState {
    last_activity: Instant,
    /// Set by [`ActivitySignal::mark`], cleared by the scheduler after each
    /// capture so passive pages don't re-capture on every tick.
    seen_since_reset: bool,
}

impl ActivitySignal {
    /// New signal, treating "now" as the initial interaction.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalState {
                last_activity: Instant::now(),
                seen_since_reset: true,
            })),
        }
    }

    /// Record a user interaction at "now". Monotonic: a mark never moves the
    /// last-activity time backward.
    pub fn mark(&self) {
        let now = Instant::now();
        let mut state = self.inner.lock().expect("activity lock poisoned");
        if now >= state.last_activity {
            state.last_activity = now;
        }
        state.seen_since_reset = true;
    }

    /// Time since the last recorded interaction.
    pub fn elapsed(&self) -> Duration {
        let state = self.inner.lock().expect("activity lock poisoned");
        state.last_activity.elapsed()
    }

    /// Current activity level, derived from [`Self::elapsed`].
    pub fn level(&self) -> ActivityLevel {
        ActivityLevel::from_elapsed(self.elapsed())
    }

    /// Whether any interaction has been marked since the last
    /// [`Self::reset`].
    pub fn seen_since_reset(&self) -> bool {
        self.inner
            .lock()
            .expect("activity lock poisoned")
            .seen_since_reset
    }

    /// Clear the seen-since flag. Called by the scheduler after a capture.
    pub fn reset(&self) {
        self.inner
            .lock()
            .expect("activity lock poisoned")
            .seen_since_reset = false;
    }
}

impl Default for ActivitySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_boundaries() {
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::ZERO),
            ActivityLevel::High
        );
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::from_millis(14_999)),
            ActivityLevel::High
        );
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::from_secs(15)),
            ActivityLevel::Normal
        );
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::from_millis(119_999)),
            ActivityLevel::Normal
        );
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::from_secs(120)),
            ActivityLevel::Low
        );
        assert_eq!(
            ActivityLevel::from_elapsed(Duration::from_secs(3_600)),
            ActivityLevel::Low
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mark_resets_elapsed() {
        let signal = ActivitySignal::new();
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(signal.level(), ActivityLevel::Low);

        signal.mark();
        assert_eq!(signal.level(), ActivityLevel::High);
    }

    #[tokio::test(start_paused = true)]
    async fn seen_since_reset_round_trip() {
        let signal = ActivitySignal::new();
        assert!(signal.seen_since_reset());

        signal.reset();
        assert!(!signal.seen_since_reset());

        signal.mark();
        assert!(signal.seen_since_reset());
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_state() {
        let signal = ActivitySignal::new();
        let clone = signal.clone();
        tokio::time::advance(Duration::from_secs(30)).await;

        clone.mark();
        assert_eq!(signal.level(), ActivityLevel::High);
    }
}
