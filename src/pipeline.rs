//! Pipeline coordination for Murmur.
//!
//! Ties the readiness gate, normalizer, embedder and index store together
//! behind the entry points the surrounding application calls: `ingest`,
//! `reindex_all`, `query`, `search` and `list_transcripts`.

use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{MurmurError, Result};
use crate::rag::{Answer, AnswerSynthesizer, OpenAISynthesizer, RagEngine};
use crate::readiness::{ReadinessGate, ReadyArtifact};
use crate::transcript::{normalize, SkipReason, TranscriptDocument, TranscriptStats};
use crate::vector_store::{AppendOutcome, IndexRecord, IndexStore, SearchResult};
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Suffix of summary files that share the transcripts directory.
const SUMMARY_SUFFIX: &str = "_summary.json";

/// What happened to one transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Embedded and written to the index.
    Indexed,
    /// The source was already in the index; nothing changed.
    AlreadyIndexed,
    /// Excluded by policy.
    Skipped(SkipReason),
    /// The file never became a complete transcript.
    NotReady(String),
    /// The embedding call failed; the document is left out of the index.
    EmbeddingFailed(String),
    /// The index could not be published; the prior index is unchanged.
    PersistFailed(String),
}

impl IngestOutcome {
    /// Whether the document is in the index after this outcome.
    pub fn is_indexed(&self) -> bool {
        matches!(self, IngestOutcome::Indexed | IngestOutcome::AlreadyIndexed)
    }

    /// Whether the outcome is a failure worth retrying later.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            IngestOutcome::NotReady(_)
                | IngestOutcome::EmbeddingFailed(_)
                | IngestOutcome::PersistFailed(_)
        )
    }
}

impl std::fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestOutcome::Indexed => write!(f, "indexed"),
            IngestOutcome::AlreadyIndexed => write!(f, "already indexed"),
            IngestOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            IngestOutcome::NotReady(e) => write!(f, "not ready: {}", e),
            IngestOutcome::EmbeddingFailed(e) => write!(f, "embedding failed: {}", e),
            IngestOutcome::PersistFailed(e) => write!(f, "persist failed: {}", e),
        }
    }
}

/// Result of ingesting one transcript.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source_id: String,
    pub outcome: IngestOutcome,
    /// The existing index was corrupt and has been replaced.
    pub recovered_corruption: bool,
}

impl IngestReport {
    fn new(source_id: &str, outcome: IngestOutcome) -> Self {
        Self {
            source_id: source_id.to_string(),
            outcome,
            recovered_corruption: false,
        }
    }
}

/// Result of a full reindex.
#[derive(Debug, Clone)]
pub struct ReindexReport {
    /// Per-document outcomes, in directory order.
    pub documents: Vec<IngestReport>,
    /// Number of records in the published index.
    pub indexed: usize,
    /// Whether a new index was published.
    pub published: bool,
}

impl ReindexReport {
    /// A report for a rebuild that was not published; documents that would
    /// have been indexed are marked as persist failures.
    fn unpublished(mut documents: Vec<IngestReport>, reason: &str) -> Self {
        for doc in &mut documents {
            if doc.outcome == IngestOutcome::Indexed {
                doc.outcome = IngestOutcome::PersistFailed(reason.to_string());
            }
        }
        Self {
            documents,
            indexed: 0,
            published: false,
        }
    }

    pub fn count(&self, predicate: impl Fn(&IngestOutcome) -> bool) -> usize {
        self.documents.iter().filter(|d| predicate(&d.outcome)).count()
    }
}

/// A transcript file found in the transcripts directory.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub source_id: String,
    /// Declared language, when the file parsed.
    pub language: Option<String>,
    pub translated: bool,
    pub indexed: bool,
    pub stats: Option<TranscriptStats>,
    pub modified: Option<DateTime<Local>>,
    /// Why the file could not be read as a transcript, if it could not.
    pub problem: Option<String>,
}

/// The main pipeline for Murmur.
pub struct Pipeline {
    gate: ReadinessGate,
    embedder: Arc<dyn Embedder>,
    store: Arc<IndexStore>,
    rag: RagEngine,
    transcripts_dir: PathBuf,
    target_language: String,
    max_concurrent: usize,
}

impl Pipeline {
    /// Create a pipeline backed by OpenAI and the configured index file.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));
        let synthesizer = Arc::new(OpenAISynthesizer::new(
            &settings.rag.model,
            settings.rag.temperature,
        ));
        let store = Arc::new(IndexStore::open(&settings.index_path())?);

        Ok(Self::with_components(
            &settings,
            prompts,
            embedder,
            synthesizer,
            store,
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        store: Arc<IndexStore>,
    ) -> Self {
        let rag = RagEngine::new(store.clone(), embedder.clone(), synthesizer)
            .with_prompts(prompts)
            .with_max_context_chars(settings.rag.max_context_chars);

        Self {
            gate: ReadinessGate::from_settings(&settings.readiness),
            embedder,
            store,
            rag,
            transcripts_dir: settings.transcripts_dir(),
            target_language: settings.ingest.target_language.clone(),
            max_concurrent: settings.ingest.max_concurrent.max(1),
        }
    }

    /// Get a reference to the index store.
    pub fn store(&self) -> Arc<IndexStore> {
        self.store.clone()
    }

    pub fn transcripts_dir(&self) -> &Path {
        &self.transcripts_dir
    }

    /// Wait for a transcript, normalize it, embed it and append it to the index.
    ///
    /// Safe to call repeatedly for the same file. Only an invalid source id is
    /// an error; every document-level result is reported in the outcome.
    #[instrument(skip(self))]
    pub async fn ingest(&self, source_id: &str) -> Result<IngestReport> {
        validate_source_id(source_id)?;
        let path = self.transcripts_dir.join(source_id);

        let artifact = match self.gate.await_ready(&path).await {
            Ok(artifact) => artifact,
            Err(e) => {
                return Ok(IngestReport::new(
                    source_id,
                    IngestOutcome::NotReady(e.to_string()),
                ))
            }
        };

        match self.store.contains(source_id).await {
            Ok(true) => {
                info!("{} is already indexed, skipping", source_id);
                return Ok(IngestReport::new(source_id, IngestOutcome::AlreadyIndexed));
            }
            Ok(false) => {}
            Err(e) => warn!("Could not read index before embedding {}: {}", source_id, e),
        }

        let record = match self.prepare(source_id, &artifact.document).await {
            Ok(record) => record,
            Err(outcome) => return Ok(IngestReport::new(source_id, outcome)),
        };

        let report = match self.store.append_if_absent(record).await {
            Ok(report) => {
                let outcome = match report.outcome {
                    AppendOutcome::Inserted => IngestOutcome::Indexed,
                    AppendOutcome::AlreadyPresent => IngestOutcome::AlreadyIndexed,
                };
                IngestReport {
                    source_id: source_id.to_string(),
                    outcome,
                    recovered_corruption: report.recovered_corruption,
                }
            }
            Err(e) => {
                warn!("Failed to save index entry for {}: {}", source_id, e);
                IngestReport::new(source_id, IngestOutcome::PersistFailed(e.to_string()))
            }
        };

        info!("{}: {}", source_id, report.outcome);
        Ok(report)
    }

    /// Ingest several transcripts concurrently, each waiting on its own file.
    pub async fn ingest_many(&self, source_ids: &[String]) -> Vec<Result<IngestReport>> {
        futures::future::join_all(source_ids.iter().map(|id| self.ingest(id))).await
    }

    /// Rebuild the index from every transcript in the transcripts directory.
    ///
    /// Documents that fail or are skipped are reported and left out. If some
    /// documents were eligible but none could be embedded, the existing index
    /// is kept rather than replaced with an empty one.
    #[instrument(skip(self))]
    pub async fn reindex_all(&self) -> Result<ReindexReport> {
        let files = self.transcript_files()?;
        info!("Found {} transcript files", files.len());

        let results: Vec<(String, std::result::Result<IndexRecord, IngestOutcome>)> =
            stream::iter(files)
                .map(|source_id| async move {
                    let result = self.prepare_file(&source_id).await;
                    (source_id, result)
                })
                .buffered(self.max_concurrent)
                .collect()
                .await;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut documents = Vec::with_capacity(results.len());

        for (source_id, result) in results {
            let outcome = match result {
                Ok(record) => {
                    if seen.insert(record.source_id.clone()) {
                        records.push(record);
                    }
                    IngestOutcome::Indexed
                }
                Err(outcome) => outcome,
            };
            debug!("{}: {}", source_id, outcome);
            documents.push(IngestReport::new(&source_id, outcome));
        }

        let embedding_failures = documents
            .iter()
            .filter(|d| matches!(d.outcome, IngestOutcome::EmbeddingFailed(_)))
            .count();

        if records.is_empty() && embedding_failures > 0 {
            warn!(
                "No transcript could be embedded ({} failures), keeping the existing index",
                embedding_failures
            );
            return Ok(ReindexReport::unpublished(documents, "index not rebuilt"));
        }

        match self.store.rebuild(records).await {
            Ok(indexed) => {
                info!("Reindexed {} transcripts", indexed);
                Ok(ReindexReport {
                    documents,
                    indexed,
                    published: true,
                })
            }
            Err(e) => {
                warn!("Failed to publish rebuilt index: {}", e);
                Ok(ReindexReport::unpublished(documents, &e.to_string()))
            }
        }
    }

    /// Answer a question from the indexed meetings.
    pub async fn query(&self, question: &str, top_k: usize) -> Result<Answer> {
        self.rag.answer(question, top_k).await
    }

    /// Rank indexed meetings against a query without generating an answer.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(query).await?;
        self.store
            .search_with_threshold(&query_vector, top_k, min_score)
            .await
    }

    /// Describe every transcript file in the transcripts directory, newest first.
    pub async fn list_transcripts(&self) -> Result<Vec<TranscriptEntry>> {
        let indexed: HashSet<String> = self.store.list_sources().await?.into_iter().collect();
        let mut entries = Vec::new();

        for source_id in self.transcript_files()? {
            let path = self.transcripts_dir.join(&source_id);
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from);

            let mut entry = TranscriptEntry {
                indexed: indexed.contains(&source_id),
                source_id,
                language: None,
                translated: false,
                stats: None,
                modified,
                problem: None,
            };

            match self.gate.probe(&path).await {
                Ok(ReadyArtifact { document, .. }) => {
                    entry.stats = Some(document.stats());
                    match &document {
                        TranscriptDocument::Keyed {
                            original_language,
                            translated,
                            ..
                        } => {
                            entry.language = Some(original_language.clone());
                            entry.translated = *translated;
                        }
                        TranscriptDocument::Bare(_) => {
                            entry.language = Some(self.target_language.clone());
                        }
                    }
                }
                Err(reason) => entry.problem = Some(reason.to_string()),
            }

            entries.push(entry);
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    /// Normalize and embed one document.
    async fn prepare(
        &self,
        source_id: &str,
        document: &TranscriptDocument,
    ) -> std::result::Result<IndexRecord, IngestOutcome> {
        let normalized = normalize(document, &self.target_language);
        if let Some(reason) = normalized.skip {
            info!("Skipping {}: {}", source_id, reason);
            return Err(IngestOutcome::Skipped(reason));
        }

        match self.embedder.embed(&normalized.text).await {
            Ok(vector) => Ok(IndexRecord::new(source_id, normalized.text, vector)),
            Err(e) => {
                warn!("Failed to embed {}: {}", source_id, e);
                Err(IngestOutcome::EmbeddingFailed(e.to_string()))
            }
        }
    }

    /// Read a transcript that is already at rest and prepare its record.
    async fn prepare_file(
        &self,
        source_id: &str,
    ) -> std::result::Result<IndexRecord, IngestOutcome> {
        let path = self.transcripts_dir.join(source_id);
        let artifact = self.gate.probe(&path).await.map_err(|reason| {
            warn!("Cannot read {}: {}", source_id, reason);
            IngestOutcome::NotReady(reason.to_string())
        })?;
        self.prepare(source_id, &artifact.document).await
    }

    /// Transcript filenames in the transcripts directory, sorted.
    fn transcript_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.transcripts_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.ends_with(".json") && !name.ends_with(SUMMARY_SUFFIX) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Source ids are bare filenames inside the transcripts directory.
fn validate_source_id(source_id: &str) -> Result<()> {
    let mut components = Path::new(source_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(MurmurError::InvalidInput(format!(
            "Invalid transcript name: {:?}",
            source_id
        ))),
    }
}
