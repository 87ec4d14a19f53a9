//! Context assembly for RAG prompts.

use crate::vector_store::SearchResult;

/// Join retrieved texts in ranked order, separated by blank lines, and cap the
/// block at `max_chars` characters.
pub fn build_context(results: &[SearchResult], max_chars: usize) -> String {
    let joined = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(joined, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
    text
}

/// Source ids in ranked order.
pub fn sources(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.source_id.clone()).collect()
}
