//! Deterministic stand-ins for the external model services.

use crate::embedding::Embedder;
use crate::error::{MurmurError, Result};
use crate::rag::AnswerSynthesizer;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Embedder returning canned vectors keyed by exact text.
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f64>>,
    fallback: Vec<f64>,
    failures: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(fallback: Vec<f64>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            failures: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f64>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.contains(text) {
            return Err(MurmurError::Embedding("simulated embedding failure".to_string()));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }
}

/// Synthesizer that records prompts and replies with a fixed answer or error.
pub struct FakeSynthesizer {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn replying(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerSynthesizer for FakeSynthesizer {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(MurmurError::OpenAI)
    }
}
