//! Query-aware snippet extraction for citations.

/// Marker appended or prepended when a snippet is truncated at that end.
pub const ELLIPSIS: &str = "...";

/// Maximum number of query terms considered when locating a snippet.
const MAX_QUERY_TERMS: usize = 5;

/// Extract a citation snippet from chunk text.
///
/// Splits the query into up to five lowercase terms, finds the first
/// case-insensitive occurrence of any term in the chunk, and returns a window
/// of `radius` characters on both sides of it, with ellipsis markers on ends
/// that were truncated. When no term occurs (or the query has no terms), the
/// leading `2 * radius` characters are returned instead.
///
/// The result is always a contiguous substring of the chunk, never a
/// rewritten string.
pub fn extract_snippet(chunk: &str, query: &str, radius: usize) -> String {
    let terms: Vec<String> = query
        .split_whitespace()
        .take(MAX_QUERY_TERMS)
        .map(str::to_lowercase)
        .collect();

    let haystack = chunk.to_lowercase();
    // Positions in the lowercased copy only map back safely when lowercasing
    // did not change byte lengths.
    let hit = if haystack.len() == chunk.len() {
        terms
            .iter()
            .filter_map(|term| haystack.find(term.as_str()).map(|pos| (pos, term.len())))
            .min_by_key(|(pos, _)| *pos)
    } else {
        None
    };

    match hit {
        Some((pos, term_len)) => window_around(chunk, pos + term_len / 2, radius),
        None => leading_window(chunk, 2 * radius),
    }
}

fn window_around(chunk: &str, center: usize, radius: usize) -> String {
    let mut start = center.saturating_sub(radius);
    while start > 0 && !chunk.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (center + radius).min(chunk.len());
    while end < chunk.len() && !chunk.is_char_boundary(end) {
        end += 1;
    }
    let end = end.min(chunk.len()).max(start);

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(chunk[start..end].trim());
    if end < chunk.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn leading_window(chunk: &str, max_chars: usize) -> String {
    let mut end = max_chars.min(chunk.len());
    while end > 0 && !chunk.is_char_boundary(end) {
        end -= 1;
    }

    let mut snippet = chunk[..end].trim_end().to_string();
    if end < chunk.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}
