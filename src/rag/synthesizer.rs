//! Language-model answer generation.

use crate::error::{MurmurError, Result};
use crate::openai::create_client;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Turns a fully rendered prompt into an answer.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completion backed synthesizer.
pub struct OpenAISynthesizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAISynthesizer {
    pub fn new(model: &str, temperature: f32) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAISynthesizer {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| MurmurError::Rag(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .temperature(self.temperature)
            .build()
            .map_err(|e| MurmurError::Rag(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            MurmurError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| MurmurError::Rag("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated answer ({} chars)", answer.len());
        Ok(answer)
    }
}
