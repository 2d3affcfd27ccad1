//! Outbound-content fingerprints and text normalisation.
//!
//! A topic fingerprint is a compact hash over the first eight significant
//! words of a narrative, used to suppress duplicate publications.

use sha2::{Digest, Sha256};

/// Minimum word length counted as significant.
const MIN_WORD_LEN: usize = 4;

/// Significant words hashed into a fingerprint.
const FINGERPRINT_WORDS: usize = 8;

/// Compute the topic fingerprint of a piece of outbound content:
/// lowercased, alphanumeric-only, first eight words of four or more
/// characters, sha256 over the joined words, first 16 hex chars.
pub fn topic_fingerprint(text: &str) -> String {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let topic: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| w.len() >= MIN_WORD_LEN)
        .take(FINGERPRINT_WORDS)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(topic.join(" ").as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Truncate to at most `max_chars`, cutting at a word boundary and
/// appending an ellipsis when content was dropped.
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(1);
    let clipped: String = text.chars().take(budget).collect();
    let cut = clipped.rfind(' ').unwrap_or(clipped.len());
    let mut out: String = clipped[..cut].trim_end().to_string();
    out.push('…');
    out
}

/// Lowercased alphanumeric prefix used for briefing-level dedup.
pub fn normalized_prefix(text: &str, max_chars: usize) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .take(max_chars)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
