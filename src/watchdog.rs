//! Generic liveness watchdog.
//!
//! Some handles the agent plants in its host (an icon, a status pill, a
//! monitored element) can be torn out from under it at any time. The
//! watchdog periodically re-asserts a liveness predicate and invokes a
//! revive action when it fails, decoupled from any specific host structure.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Periodic re-assertion of "is my thing still there".
pub struct Watchdog {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Every `period`, call `is_alive`; when it returns false, call
    /// `revive`. Runs until [`Watchdog::stop`] or drop.
    pub fn spawn<A, R>(period: Duration, is_alive: A, revive: R) -> Self
    where
        A: Fn() -> bool + Send + 'static,
        R: Fn() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; skip the zeroth tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !is_alive() {
                            debug!("watchdog lost its handle, reviving");
                            revive();
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
