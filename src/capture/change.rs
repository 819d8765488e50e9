//! Dual-signal "changed enough" detection between two page snapshots.
//!
//! A raw hash catches any byte-level difference but over-triggers on pages
//! with live-updating widgets; token overlap alone under-triggers on short
//! pages where one edit swings the ratio. The detector combines navigation
//! signals (url, title) with both content signals, biased toward not missing
//! a real change.

use crate::capture::snapshot::{text_similarity, ContentSnapshot};

/// Decides whether the visible content moved enough to warrant a capture.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    /// Similarity below this floor counts as changed (default 0.9).
    similarity_floor: f64,
}

impl ChangeDetector {
    pub fn new(similarity_floor: f64) -> Self {
        Self { similarity_floor }
    }

    /// True when `current` differs meaningfully from `previous`.
    ///
    /// Changed ⇔ url differs, or title differs, or the content hash differs,
    /// or token-set similarity drops below the floor.
    pub fn has_changed(&self, previous: &ContentSnapshot, current: &ContentSnapshot) -> bool {
        if previous.url != current.url || previous.title != current.title {
            return true;
        }

        if previous.hash != current.hash {
            return true;
        }

        text_similarity(&previous.text, &current.text) < self.similarity_floor
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(0.9)
    }
}
