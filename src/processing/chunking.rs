//! Text chunking for the ingestion pipeline.
//!
//! This module encapsulates how askdocs turns extracted text into overlapping,
//! budget-bounded segments. Highlights:
//!
//! - Token budgets are approximated as characters using a fixed ratio, so the
//!   chunker stays a pure function with no tokenizer dependency.
//! - Cut points prefer natural boundaries: a paragraph break in the back 40% of
//!   the window, then a sentence end, then a word boundary, then a hard cut.
//!   The hard cut guarantees forward progress on unbroken runs of text.
//! - Adjacent chunks share a configurable overlap window so spans near
//!   boundaries remain visible to retrieval.

use super::types::ChunkingError;

/// Approximate number of characters per token used to convert budgets.
pub const CHARS_PER_TOKEN: usize = 4;

/// Fraction of the window (as a ratio out of [`CUT_FLOOR_DEN`]) a paragraph or
/// sentence boundary must clear to be preferred over a plain word boundary.
const CUT_FLOOR_NUM: usize = 3;
const CUT_FLOOR_DEN: usize = 5;

/// One bounded slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Zero-based position of the chunk within its document; contiguous.
    pub index: usize,
    /// Non-empty chunk text.
    pub content: String,
}

/// Split text into overlapping chunks bounded by a token budget.
///
/// - `max_tokens` bounds each chunk at `max_tokens * 4` characters.
/// - `overlap_tokens` requests a trailing/leading overlap between adjacent
///   chunks; it is applied when advancing the scan position and never stalls
///   the scan, even when `overlap_tokens >= max_tokens`.
///
/// Returns an empty vector when the input is empty or all whitespace; any
/// other input yields at least one chunk with indices contiguous from zero.
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Result<Vec<TextChunk>, ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let overlap_chars = overlap_tokens * CHARS_PER_TOKEN;
    let normalized = normalize_text(text);
    let text = normalized.as_str();
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0_usize;

    loop {
        let mut end = (start + max_chars).min(len);
        while end < len && !text.is_char_boundary(end) {
            end -= 1;
        }
        let window = &text[start..end];
        let at_end = end == len;

        let cut = if at_end { window.len() } else { select_cut(window) };
        let piece = window[..cut].trim();
        if !piece.is_empty() {
            chunks.push(TextChunk {
                index: chunks.len(),
                content: piece.to_string(),
            });
        }

        if at_end {
            break;
        }

        // The overlap subtraction must never stall the scan; fall back to a
        // full advance when the overlap swallows the whole emitted piece.
        let mut advance = cut.saturating_sub(overlap_chars);
        if advance == 0 {
            advance = cut;
        }
        start += advance;
        while start < len && !text.is_char_boundary(start) {
            start += 1;
        }
    }

    Ok(chunks)
}

/// Pick the cut point for a non-final window.
///
/// Cascade: last paragraph break at or past the floor, last sentence boundary
/// at or past the floor, last word boundary anywhere, full window.
fn select_cut(window: &str) -> usize {
    let floor = window.len() * CUT_FLOOR_NUM / CUT_FLOOR_DEN;

    if let Some(pos) = window.rfind("\n\n")
        && pos >= floor
    {
        return pos;
    }
    if let Some(pos) = window.rfind(". ")
        && pos >= floor
    {
        return pos + 1;
    }
    if let Some(pos) = window.rfind(' ')
        && pos > 0
    {
        return pos;
    }
    window.len()
}

/// Unify line endings and strip trailing whitespace before each newline.
fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    lines.join("\n")
}
