//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, top_k: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let top_k = top_k.unwrap_or(settings.rag.top_k);
    let pipeline = Pipeline::new(settings)?;

    let spinner = Output::spinner("Searching meetings...");

    match pipeline.query(question, top_k).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            if answer.synthesis_failed {
                Output::warning(&answer.answer);
            } else {
                println!("\n{}\n", answer.answer);
            }

            if !answer.matches.is_empty() {
                Output::header("Sources");
                for m in &answer.matches {
                    Output::search_result(&m.source_id, m.score, &m.text);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
