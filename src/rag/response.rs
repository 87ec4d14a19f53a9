//! RAG answer generation.

use super::context::{build_context, sources};
use super::AnswerSynthesizer;
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::{MurmurError, Result};
use crate::vector_store::{IndexStore, SearchResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Minimum question length in characters, after trimming.
const MIN_QUESTION_CHARS: usize = 3;

/// Answer returned when the index holds nothing to search.
const EMPTY_INDEX_ANSWER: &str =
    "No meetings have been indexed yet, so there is nothing to answer from.";

/// RAG engine for question answering.
pub struct RagEngine {
    store: Arc<IndexStore>,
    embedder: Arc<dyn Embedder>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    prompts: Prompts,
    max_context_chars: usize,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(
        store: Arc<IndexStore>,
        embedder: Arc<dyn Embedder>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Self {
        Self {
            store,
            embedder,
            synthesizer,
            prompts: Prompts::default(),
            max_context_chars: 12_000,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Bound the context block handed to the model.
    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    /// Embed `question` and return the `top_k` closest transcripts.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(question).await?;
        self.store.search(&query_vector, top_k).await
    }

    /// Answer a question from the indexed meetings.
    ///
    /// A failing language-model call is reported inside the returned
    /// [`Answer`]; retrieval failures are returned as errors.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<Answer> {
        let question = question.trim();
        if question.chars().count() < MIN_QUESTION_CHARS {
            return Err(MurmurError::InvalidInput(format!(
                "Question must be at least {} characters",
                MIN_QUESTION_CHARS
            )));
        }

        info!("Processing question: {}", question);

        if self.store.is_empty().await? {
            return Ok(Answer {
                answer: EMPTY_INDEX_ANSWER.to_string(),
                sources: Vec::new(),
                matches: Vec::new(),
                synthesis_failed: false,
            });
        }

        let matches = self.retrieve(question, top_k).await?;
        let context = build_context(&matches, self.max_context_chars);

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context);
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.answer.user, &vars);

        let (answer, synthesis_failed) = match self.synthesizer.complete(&prompt).await {
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                (format!("Answer generation failed: {}", e), true)
            }
        };

        debug!("Answered with {} sources", matches.len());

        Ok(Answer {
            answer,
            sources: sources(&matches),
            matches,
            synthesis_failed,
        })
    }
}

/// An answer with the transcripts it was based on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated answer, or a failure message if generation failed.
    pub answer: String,
    /// Source ids in ranked order.
    pub sources: Vec<String>,
    /// The ranked excerpts used as context.
    pub matches: Vec<SearchResult>,
    /// Set when the language-model call failed.
    pub synthesis_failed: bool,
}

impl Answer {
    /// Format the answer for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.matches.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for m in &self.matches {
                output.push_str(&format!("\n{} (score: {:.2})", m.source_id, m.score));
            }
        }

        output
    }
}
