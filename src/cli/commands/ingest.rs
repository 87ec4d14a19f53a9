//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(source_ids: &[String], settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner(&format!("Waiting for {} transcript(s)...", source_ids.len()));
    let results = pipeline.ingest_many(source_ids).await;
    spinner.finish_and_clear();

    let mut failures = 0;
    for (source_id, result) in source_ids.iter().zip(results) {
        match result {
            Ok(report) => {
                if report.outcome.is_failure() {
                    failures += 1;
                }
                Output::ingest_report(&report);
            }
            Err(e) => {
                failures += 1;
                Output::error(&format!("{}: {}", source_id, e));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} transcript(s) could not be indexed", failures, source_ids.len());
    }

    Ok(())
}
