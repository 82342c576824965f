//! Text chunking with configurable size and overlap.
//!
//! Cut points prefer paragraph breaks, then sentence ends, then a hard cut
//! at the size limit. Every offset is kept relative to the source text so
//! the original document can be reconstructed exactly from its chunks with
//! the overlap removed.

use atrium_core::{AppError, AppResult};

/// A chunk candidate before embedding: text plus its position in the
/// source document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    /// Sequence index within the document
    pub seq: u32,

    /// Chunk text, including the leading overlap for chunks after the first
    pub text: String,

    /// Byte offset of the chunk start in the source text
    pub start_offset: usize,

    /// Byte offset one past the chunk end
    pub end_offset: usize,
}

/// Chunk text into overlapping segments.
///
/// The fresh portion of each chunk is at most `chunk_size` bytes; chunks
/// after the first additionally carry up to `overlap` bytes of trailing
/// context from the previous chunk. Cuts land on UTF-8 character
/// boundaries.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<ChunkSpan>> {
    if chunk_size == 0 {
        return Err(AppError::InvalidConfiguration(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::InvalidConfiguration(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    if text.is_empty() {
        return Err(AppError::InvalidConfiguration(
            "cannot chunk empty text".to_string(),
        ));
    }

    // Contiguous cut points: cuts[i] ends chunk i's fresh text and starts
    // chunk i+1's.
    let mut cuts = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let cut = next_cut(text, cursor, chunk_size);
        cuts.push(cut);
        cursor = cut;
    }

    let mut chunks = Vec::with_capacity(cuts.len());
    let mut fresh_start = 0usize;
    for (seq, &end) in cuts.iter().enumerate() {
        let start = if seq == 0 {
            0
        } else {
            floor_char_boundary(text, fresh_start.saturating_sub(overlap))
        };

        chunks.push(ChunkSpan {
            seq: seq as u32,
            text: text[start..end].to_string(),
            start_offset: start,
            end_offset: end,
        });
        fresh_start = end;
    }

    tracing::debug!(
        "Chunked {} bytes into {} chunks (size: {}, overlap: {})",
        text.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Reassemble the source text from its chunks, dropping each chunk's
/// leading overlap. Chunks must be in sequence order.
pub fn reconstruct(chunks: &[ChunkSpan]) -> String {
    let mut text = String::new();
    let mut covered = 0;
    for chunk in chunks {
        // Skip the part of this chunk already contributed by the previous one
        let skip = covered - chunk.start_offset;
        text.push_str(&chunk.text[skip..]);
        covered = chunk.end_offset;
    }
    text
}

/// Pick the cut point for the chunk starting at `cursor`.
///
/// Preference order: last paragraph break within the window, last sentence
/// end, hard cut at the size limit.
fn next_cut(text: &str, cursor: usize, chunk_size: usize) -> usize {
    let limit = hard_limit(text, cursor, chunk_size);
    if limit == text.len() {
        return limit;
    }

    let window = &text[cursor..limit];

    // Cut after the paragraph separator so the next chunk starts at a
    // paragraph start.
    if let Some(pos) = window.rfind("\n\n") {
        let cut = cursor + pos + 2;
        if cut > cursor {
            return cut;
        }
    }

    if let Some(cut) = last_sentence_end(window) {
        return cursor + cut;
    }

    limit
}

/// The furthest admissible cut: `cursor + chunk_size` aligned down to a
/// character boundary, but always past `cursor` so progress is guaranteed
/// even for an oversized single character.
fn hard_limit(text: &str, cursor: usize, chunk_size: usize) -> usize {
    let target = (cursor + chunk_size).min(text.len());
    let mut limit = floor_char_boundary(text, target);
    if limit <= cursor {
        limit = ceil_char_boundary(text, cursor + 1);
    }
    limit
}

/// Position just after the last sentence-ending punctuation followed by
/// whitespace, or `None` if the window has no sentence end.
fn last_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    let mut best = None;
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') {
            if let Some(&next) = bytes.get(i + 1) {
                if next.is_ascii_whitespace() {
                    best = Some(i + 2);
                }
            }
        }
    }
    best.filter(|&cut| cut > 0 && cut <= window.len())
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}
