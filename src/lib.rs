//! Murmur - Meeting transcript search and question answering
//!
//! Watches for meeting transcripts written by an upstream transcription
//! step, embeds them into a flat JSON index, and answers questions by
//! retrieving the closest meetings and handing them to a chat model.
//!
//! # Architecture
//!
//! - `readiness` - Waits for a transcript file to be complete before it is read
//! - `transcript` - Transcript shapes and the language policy applied before embedding
//! - `vector_store` - Index store with idempotent append and atomic publish
//! - `embedding` - Embedding generation
//! - `rag` - Answer synthesis from retrieved meetings
//! - `pipeline` - Entry points tying the above together
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use murmur::config::Settings;
//! use murmur::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(settings)?;
//!
//!     let report = pipeline.ingest("meeting_2024_05_01.json").await?;
//!     println!("{}: {}", report.source_id, report.outcome);
//!
//!     let answer = pipeline.query("What did we decide about the budget?", 3).await?;
//!     println!("{}", answer.format_for_display());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod pipeline;
pub mod rag;
pub mod readiness;
pub mod transcript;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MurmurError, Result};
