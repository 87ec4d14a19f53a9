//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! Retrieves the closest meeting transcripts for a question and hands them to
//! a language model as context.

pub mod context;
mod response;
mod synthesizer;

pub use context::build_context;
pub use response::{Answer, RagEngine};
pub use synthesizer::{AnswerSynthesizer, OpenAISynthesizer};
