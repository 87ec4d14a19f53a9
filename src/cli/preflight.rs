//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{MurmurError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingesting embeds text, so it needs the API key and the transcripts directory.
    Ingest,
    /// Reindexing has the same needs as ingesting.
    Reindex,
    /// Asking questions embeds the question and calls the chat model.
    Ask,
    /// Search embeds the query.
    Search,
    /// Listing only reads local files.
    List,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Reindex => {
            check_api_key()?;
            check_transcripts_dir(settings)?;
        }
        Operation::Ask | Operation::Search => {
            check_api_key()?;
        }
        Operation::List => {
            check_transcripts_dir(settings)?;
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(MurmurError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(MurmurError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

fn check_transcripts_dir(settings: &Settings) -> Result<()> {
    let dir = settings.transcripts_dir();
    if dir.is_dir() {
        Ok(())
    } else {
        Err(MurmurError::Config(format!(
            "Transcripts directory {} does not exist. Set general.transcripts_dir in {}",
            dir.display(),
            Settings::default_config_path().display()
        )))
    }
}
