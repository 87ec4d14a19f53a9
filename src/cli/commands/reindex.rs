//! Reindex command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{IngestOutcome, Pipeline};
use anyhow::Result;

/// Run the reindex command.
pub async fn run_reindex(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Reindex, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner(&format!(
        "Reindexing {}...",
        pipeline.transcripts_dir().display()
    ));
    let result = pipeline.reindex_all().await;
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Reindex failed: {}", e));
            return Err(e.into());
        }
    };

    for doc in report.documents.iter().filter(|d| d.outcome != IngestOutcome::Indexed) {
        Output::ingest_report(doc);
    }

    Output::header("Reindex summary");
    Output::kv("Transcripts", &report.documents.len().to_string());
    Output::kv("Indexed", &report.indexed.to_string());
    Output::kv(
        "Skipped",
        &report
            .count(|o| matches!(o, IngestOutcome::Skipped(_)))
            .to_string(),
    );
    Output::kv("Failed", &report.count(IngestOutcome::is_failure).to_string());

    if report.published {
        Output::success("Index rebuilt.");
    } else {
        Output::warning("The index was not rebuilt; the existing index was kept.");
    }

    Ok(())
}
