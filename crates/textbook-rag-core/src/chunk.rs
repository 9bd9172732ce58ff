//! Fixed-window text chunker with overlap.
//!
//! Splits raw text into windows of `chunk_size` characters, each window
//! starting `chunk_size - overlap` characters after the previous one, so that
//! neighbouring chunks share `overlap` characters of context.
//!
//! # Algorithm
//!
//! 1. Reject `overlap >= chunk_size` (the window would never advance).
//! 2. Starting at character 0, take the window `[start, start + chunk_size)`.
//! 3. Trim leading/trailing whitespace and emit it, even if it is now empty.
//! 4. Advance `start` by `chunk_size - overlap`; stop once `start >= len`.
//!
//! Positions are counted in characters, never bytes, so windows never split
//! a multi-byte code point.
//!
//! # Example
//!
//! ```rust
//! use textbook_rag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 1).unwrap();
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
//! ```

use std::ops::Range;

use crate::error::{RagError, Result};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2500;
/// Default overlap between neighbouring windows, in characters.
pub const DEFAULT_OVERLAP: usize = 300;

/// Checks `chunk_size > overlap >= 0`.
pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfiguration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidConfiguration(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Character ranges of every window over a text of `len` characters.
///
/// The ranges are exactly the windows [`chunk_text`] slices, before trimming.
pub fn chunk_spans(len: usize, chunk_size: usize, overlap: usize) -> Result<Vec<Range<usize>>> {
    validate_params(chunk_size, overlap)?;

    let step = chunk_size - overlap;
    let mut spans = Vec::with_capacity(len / step + 1);
    let mut start = 0;
    while start < len {
        spans.push(start..(start + chunk_size).min(len));
        start += step;
    }
    Ok(spans)
}

/// Split `text` into overlapping, whitespace-trimmed windows.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] unless `chunk_size > overlap`.
///
/// # Guarantees
///
/// - Empty text yields no chunks.
/// - Text shorter than `chunk_size` yields exactly one chunk.
/// - Windows that trim down to nothing are still emitted.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    // Byte offset of every character, plus the end of the string.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = offsets.len() - 1;

    let chunks = chunk_spans(char_len, chunk_size, overlap)?
        .into_iter()
        .map(|span| text[offsets[span.start]..offsets[span.end]].trim().to_string())
        .collect();
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            chunk_text("hello", 10, 10),
            Err(RagError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            chunk_text("hello", 10, 20),
            Err(RagError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            chunk_text("hello", 0, 0),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_single_stripped_chunk() {
        let chunks = chunk_text("  Hello, world!\n", 100, 10).unwrap();
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_windows_overlap() {
        let chunks = chunk_text("abcdefghij", 4, 2).unwrap();
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij", "ij"]);
    }

    #[test]
    fn test_no_overlap() {
        let chunks = chunk_text("abcdefgh", 4, 0).unwrap();
        assert_eq!(chunks, vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_whitespace_window_still_emitted() {
        let chunks = chunk_text("abcd    efgh", 4, 0).unwrap();
        assert_eq!(chunks, vec!["abcd", "", "efgh"]);
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let chunks = chunk_text("héllo wörld", 3, 1).unwrap();
        assert_eq!(chunks[0], "hél");
        assert_eq!(chunks[1], "llo");
        for c in &chunks {
            assert!(c.chars().count() <= 3);
        }
    }

    #[test]
    fn test_spans_cover_every_position() {
        for len in [0usize, 1, 7, 50, 101] {
            for (size, overlap) in [(1, 0), (4, 1), (10, 3), (10, 9), (64, 0)] {
                let spans = chunk_spans(len, size, overlap).unwrap();
                for pos in 0..len {
                    assert!(
                        spans.iter().any(|s| s.contains(&pos)),
                        "position {} uncovered (len={}, size={}, overlap={})",
                        pos,
                        len,
                        size,
                        overlap
                    );
                }
                for w in spans.windows(2) {
                    assert_eq!(w[1].start - w[0].start, size - overlap);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        let a = chunk_text(text, 12, 4).unwrap();
        let b = chunk_text(text, 12, 4).unwrap();
        assert_eq!(a, b);
    }
}
