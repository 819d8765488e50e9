//! Page observation, change detection, and the adaptive capture loop.
//!
//! The host embeds the pipeline by implementing [`PageSource`] (how to read
//! the page) and a [`sink::CaptureSink`] (where captures go); the
//! [`scheduler::CaptureScheduler`] owns everything in between.

pub mod change;
pub mod scheduler;
pub mod sink;
pub mod snapshot;

use snapshot::PageView;

/// Read access to the observed page.
///
/// The extraction heuristics that locate readable text live on the host side;
/// this seam consumes them as a pure observation. `None` means the page is
/// not currently observable (torn down, navigating).
pub trait PageSource: Send + Sync {
    fn observe(&self) -> Option<PageView>;
}
