//! Cosine-similarity ranking over a full index snapshot.

use super::{IndexRecord, SearchResult};

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 3;

/// Compute cosine similarity between two vectors.
///
/// Mismatched dimensions, empty vectors and zero-norm vectors all score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot_product / (norm_a * norm_b);
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Rank every record against `query` and keep the best `top_k`.
///
/// The sort is stable, so records with equal scores keep their index order.
pub fn rank(
    records: &[IndexRecord],
    query: &[f64],
    top_k: usize,
    min_score: Option<f64>,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = records
        .iter()
        .map(|record| SearchResult {
            text: record.text.clone(),
            source_id: record.source_id.clone(),
            score: cosine_similarity(query, &record.vector),
        })
        .filter(|r| min_score.is_none_or(|min| r.score >= min))
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}
