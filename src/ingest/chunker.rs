//! Fixed-window text chunking with overlap.
//!
//! Splitting is deliberately simple: windows of whole words sized to a
//! character target, with a character-sized overlap carried into the next
//! window so context at a boundary is available to both neighbors. Semantic
//! boundaries are the embedding model's problem, not the chunker's.

use crate::config::ChunkingConfig;

/// Caps text to its leading `max_chars` characters on a char boundary.
///
/// Applied before chunking so embedding cost stays bounded on very long
/// documents; the tail beyond the cap is dropped on purpose.
#[must_use]
pub fn cap_text(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Splits text into overlapping windows per the configured policy.
#[derive(Clone, Debug)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Splits `text` into chunks of whole words in original text order.
    ///
    /// Interior whitespace is normalized to single spaces. Empty and
    /// whitespace-only input yields no chunks. A single word longer than the
    /// target becomes its own chunk rather than being cut.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let target = self.config.target_chars.max(1);
        let overlap = self.config.overlap_chars.min(target.saturating_sub(1));

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let char_len = |word: &str| word.chars().count();
        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            // Grow the window word by word until the target is reached.
            let mut window_chars = 0usize;
            let mut end = start;
            while end < words.len() {
                let cost = if window_chars == 0 {
                    char_len(words[end])
                } else {
                    1 + char_len(words[end])
                };
                if window_chars > 0 && window_chars + cost > target {
                    break;
                }
                window_chars += cost;
                end += 1;
            }
            chunks.push(words[start..end].join(" "));

            if end >= words.len() {
                break;
            }
            // Step back roughly `overlap` characters worth of words, always
            // leaving at least one word of forward progress.
            let mut carried = 0usize;
            let mut next = end;
            while next > start + 1 && carried < overlap {
                next -= 1;
                carried += char_len(words[next]) + 1;
            }
            start = next;
        }
        chunks
    }
}
