//! List command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::List, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let pipeline = Pipeline::new(settings)?;

    match pipeline.list_transcripts().await {
        Ok(entries) => {
            if entries.is_empty() {
                Output::info(&format!(
                    "No transcripts found in {}.",
                    pipeline.transcripts_dir().display()
                ));
            } else {
                Output::header(&format!("Transcripts ({})", entries.len()));
                println!();

                for entry in &entries {
                    Output::transcript_entry(entry);
                }

                let indexed = entries.iter().filter(|e| e.indexed).count();
                let words: usize = entries
                    .iter()
                    .filter_map(|e| e.stats)
                    .map(|s| s.words)
                    .sum();
                println!();
                Output::kv("Total transcripts", &entries.len().to_string());
                Output::kv("Indexed", &indexed.to_string());
                Output::kv("Total words", &words.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list transcripts: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
