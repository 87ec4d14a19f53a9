//! Error types for Murmur.

use thiserror::Error;

/// Library-level error type for Murmur operations.
#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index persist failed: {0}")]
    Persist(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Murmur operations.
pub type Result<T> = std::result::Result<T, MurmurError>;
