//! Page snapshots and the text-similarity primitives behind change detection.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// What a page looks like at one instant, as reported by a
/// [`PageSource`](super::PageSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub url: String,
    pub title: String,
    /// Readable text blob produced by the host's extraction heuristics.
    pub text: String,
}

/// One captured observation of a page. The scheduler retains exactly one
/// "last" snapshot, overwritten on each capture.
#[derive(Debug, Clone)]
pub struct ContentSnapshot {
    pub url: String,
    pub title: String,
    pub text: String,
    pub hash: u64,
    pub captured_at: DateTime<Utc>,
}

impl ContentSnapshot {
    pub fn from_view(view: &PageView, captured_at: DateTime<Utc>) -> Self {
        Self {
            url: view.url.clone(),
            title: view.title.clone(),
            text: view.text.clone(),
            hash: content_hash(&view.text),
            captured_at,
        }
    }
}

/// Cheap FNV-1a hash over the raw text. Catches any byte-level change; noisy
/// for pages with live-updating widgets, which is why change detection also
/// consults token overlap.
pub fn content_hash(text: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in text.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Lowercased word tokens longer than two characters.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(|word| word.to_lowercase())
        .collect()
}

/// Jaccard similarity over two token sets.
///
/// An empty union means two empty texts, which are identical (1.0). A single
/// empty side yields 0.0, so a blank-to-populated transition always reads as
/// a change.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Similarity of two raw text blobs (tokenize then Jaccard).
pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokenize(a), &tokenize(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_sensitive() {
        assert_eq!(content_hash("hello world"), content_hash("hello world"));
        assert_ne!(content_hash("hello world"), content_hash("hello world."));
        assert_ne!(content_hash(""), content_hash(" "));
    }

    #[test]
    fn tokenize_drops_short_words_and_lowercases() {
        let tokens = tokenize("The Quick brown fox is on IT");
        assert!(tokens.contains("the"));
        assert!(tokens.contains("quick"));
        assert!(tokens.contains("brown"));
        assert!(tokens.contains("fox"));
        // "is", "on", "IT" are two characters or fewer
        assert!(!tokens.contains("is"));
        assert!(!tokens.contains("it"));
    }

    #[test]
    fn jaccard_identical_sets() {
        let a = tokenize("memory stores capture everything");
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_disjoint_sets() {
        let a = tokenize("alpha beta gamma");
        let b = tokenize("delta epsilon zeta");
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn similarity_empty_cases() {
        assert_eq!(text_similarity("", ""), 1.0);
        assert_eq!(text_similarity("", "now with real content here"), 0.0);
        assert_eq!(text_similarity("now with real content here", ""), 0.0);
    }

    #[test]
    fn similarity_partial_overlap() {
        // 3 shared tokens out of 4 total
        let sim = text_similarity("one two2 shared words", "one two2 shared terms");
        assert!(sim > 0.5 && sim < 1.0);
    }
}
