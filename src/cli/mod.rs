//! CLI module for Murmur.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Murmur - Meeting transcript search and question answering
///
/// Indexes meeting transcripts as embeddings and answers questions from them.
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "MURMUR_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wait for transcripts to be written, then add them to the index
    Ingest {
        /// Transcript filenames inside the transcripts directory
        #[arg(required = true)]
        source_ids: Vec<String>,
    },

    /// Rebuild the index from every transcript in the transcripts directory
    Reindex,

    /// Ask a question and get an answer from your meetings
    Ask {
        /// The question to ask
        question: String,

        /// Number of meetings to use as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search meetings without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score (-1.0 to 1.0)
        #[arg(short, long, default_value = "0.0")]
        min_score: f64,
    },

    /// List transcripts and whether they are indexed
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
