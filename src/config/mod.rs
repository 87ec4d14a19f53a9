//! Configuration module for Murmur.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexSettings, IngestSettings, PromptSettings,
    RagSettings, ReadinessSettings, Settings,
};
