//! Overlapping, whitespace-aligned text chunker.
//!
//! Splits knowledge-document content into [`Chunk`]s of at most
//! `max_chunk_size` characters. Consecutive chunks share exactly `overlap`
//! characters so that context spanning a window edge is embedded twice.
//!
//! # Algorithm
//!
//! 1. Empty text yields no chunks.
//! 2. If the rest of the text fits in one window, emit it and stop.
//! 3. Otherwise end the window at the last whitespace boundary (the position
//!    right after a whitespace char) in `(start + max(overlap, max/2), start + max]`,
//!    or hard-cut at `start + max` when there is none.
//! 4. The next window starts `overlap` characters before that end.
//!
//! Sizes and offsets are counted in `char`s, never bytes, so multibyte text
//! is never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use blogforge_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc-1", "alpha beta gamma delta", 12, 4);
//! assert_eq!(chunks[0].text, "alpha beta ");
//! assert_eq!(chunks[1].start, chunks[0].end - 4);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split `text` into overlapping chunks.
///
/// # Guarantees
///
/// - Every chunk is at most `max_chunk_size` characters.
/// - Chunk `i + 1` starts exactly `overlap` characters before chunk `i` ends.
/// - Chunk 0 followed by every later chunk minus its first `overlap`
///   characters reconstructs `text` exactly.
/// - Indices are contiguous from 0.
///
/// `overlap` is clamped to `max_chunk_size - 1` so the window always advances.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    max_chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let max = max_chunk_size.max(1);
    let overlap = overlap.min(max - 1);

    let chars: Vec<char> = text.chars().collect();
    let byte_offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let index = chunks.len() as i64;
        if total - start <= max {
            chunks.push(make_chunk(document_id, index, text, &byte_offsets, start, total));
            break;
        }

        let end = window_end(&chars, start, max, overlap);
        chunks.push(make_chunk(document_id, index, text, &byte_offsets, start, end));
        start = end - overlap;
    }

    chunks
}

/// Pick the end of the window beginning at `start`.
///
/// The result is always in `(start + overlap, start + max]`.
fn window_end(chars: &[char], start: usize, max: usize, overlap: usize) -> usize {
    let hard_end = start + max;
    let floor = start + overlap.max(max / 2);

    (floor + 1..=hard_end)
        .rev()
        .find(|&end| chars[end - 1].is_whitespace())
        .unwrap_or(hard_end)
}

/// Stable chunk id: UUIDv5 of `document_id:index`.
pub fn chunk_id(document_id: &str, index: i64) -> String {
    let name = format!("{}:{}", document_id, index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn make_chunk(
    document_id: &str,
    index: i64,
    text: &str,
    byte_offsets: &[usize],
    start: usize,
    end: usize,
) -> Chunk {
    let span = &text[byte_offsets[start]..byte_offsets[end]];

    let mut hasher = Sha256::new();
    hasher.update(span.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: span.to_string(),
        start,
        end,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_text(words: usize) -> String {
        let vocab = ["apex", "trigger", "soql", "governor", "limit", "callout", "batchable"];
        (0..words)
            .map(|i| vocab[i % vocab.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(chunk_text("doc1", "", 100, 10).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("doc1", "Hello, world!", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_reconstruction_and_bounds() {
        let text = sample_text(900);
        for (max, overlap) in [(200, 20), (120, 0), (64, 63), (1000, 100)] {
            let chunks = chunk_text("doc1", &text, max, overlap);
            assert_eq!(reconstruct(&chunks, overlap), text, "max={} overlap={}", max, overlap);
            for c in &chunks {
                assert!(c.text.chars().count() <= max);
                assert_eq!(c.text.chars().count(), c.end - c.start);
            }
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end - pair[1].start, overlap);
            }
        }
    }

    #[test]
    fn test_windows_end_on_whitespace() {
        let text = sample_text(400);
        let chunks = chunk_text("doc1", &text, 150, 15);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.text.ends_with(' '), "chunk {} ends mid-word", c.chunk_index);
        }
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "x".repeat(250);
        let chunks = chunk_text("doc1", &text, 100, 10);
        assert_eq!(chunks[0].text.len(), 100);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_ten_thousand_chars_chunk_count() {
        let text = "word ".repeat(2000);
        assert_eq!(text.chars().count(), 10_000);
        let chunks = chunk_text("doc1", &text, 1000, 100);
        let expected = (10_000f64 / 900f64).ceil() as i64;
        assert!((chunks.len() as i64 - expected).abs() <= 1, "got {}", chunks.len());
    }

    #[test]
    fn test_indices_contiguous() {
        let chunks = chunk_text("doc1", &sample_text(300), 80, 8);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.document_id, "doc1");
        }
    }

    #[test]
    fn test_multibyte_utf8() {
        let text = "┌──────────┐ │ héllo wörld │ └──────────┘ ".repeat(10);
        let chunks = chunk_text("doc1", &text, 17, 3);
        assert_eq!(reconstruct(&chunks, 3), text);
    }

    #[test]
    fn test_overlap_clamped() {
        let chunks = chunk_text("doc1", &sample_text(50), 10, 50);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 9), sample_text(50));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = chunk_text("doc1", &sample_text(100), 60, 6);
        let b = chunk_text("doc1", &sample_text(100), 60, 6);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.text, y.text);
        }
    }

    #[test]
    fn test_chunk_ids_stable_per_document_and_index() {
        let a = chunk_text("doc1", &sample_text(100), 60, 6);
        let b = chunk_text("doc1", &sample_text(100), 60, 6);
        let other = chunk_text("doc2", &sample_text(100), 60, 6);

        let ids: Vec<_> = a.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, b.iter().map(|c| c.id.clone()).collect::<Vec<_>>());
        assert_eq!(ids[0], chunk_id("doc1", 0));

        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(other.iter().all(|c| !ids.contains(&c.id)));
    }
}
