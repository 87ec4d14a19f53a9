//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    top_k: Option<usize>,
    min_score: f64,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let top_k = top_k.unwrap_or(settings.rag.top_k);
    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.search(query, top_k, min_score).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            if results.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", results.len()));
                for result in &results {
                    Output::search_result(&result.source_id, result.score, &result.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
