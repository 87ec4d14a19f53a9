//! Persisted embedding index.
//!
//! The index is a single JSON array of `{"embedding", "text", "source"}`
//! records. [`IndexStore`] owns the read-modify-write-publish cycle and the
//! locking around it; an [`IndexBackend`] only knows how to read the current
//! snapshot and atomically publish a new one.

mod file;
mod memory;
pub mod search;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use search::{cosine_similarity, DEFAULT_TOP_K};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// One embedded transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Embedding vector.
    #[serde(rename = "embedding")]
    pub vector: Vec<f64>,
    /// Flattened transcript text.
    pub text: String,
    /// Transcript filename; unique across the index.
    #[serde(rename = "source")]
    pub source_id: String,
}

impl IndexRecord {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            vector,
            text: text.into(),
            source_id: source_id.into(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Text of the matched transcript.
    pub text: String,
    /// Transcript filename.
    pub source_id: String,
    /// Cosine similarity (higher is better).
    pub score: f64,
}

/// What an append did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyPresent,
}

/// Result of [`IndexStore::append_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    pub outcome: AppendOutcome,
    /// The previous artifact could not be parsed and was replaced.
    pub recovered_corruption: bool,
}

/// Exclusive access to the index for one read-modify-write cycle.
///
/// Released on drop.
#[derive(Debug)]
pub struct BackendLock {
    file: Option<std::fs::File>,
}

impl BackendLock {
    /// A lock that relies on the store's in-process mutex alone.
    pub fn in_process() -> Self {
        Self { file: None }
    }

    /// A lock held through an exclusive OS lock on `file`.
    pub fn file(file: std::fs::File) -> Self {
        Self { file: Some(file) }
    }
}

impl Drop for BackendLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.unlock();
        }
    }
}

/// Storage for the serialized index snapshot.
///
/// Implementations are blocking; [`IndexStore`] calls them from
/// `spawn_blocking`.
pub trait IndexBackend: Send + Sync + 'static {
    /// Read the raw snapshot, or `None` if nothing has been published yet.
    fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the snapshot so that readers observe either the old or the new
    /// content in full.
    fn publish(&self, bytes: &[u8]) -> Result<()>;

    /// Acquire exclusive access for a read-modify-write cycle.
    fn lock(&self) -> Result<BackendLock>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

struct Snapshot {
    records: Vec<IndexRecord>,
    recovered_corruption: bool,
}

impl Snapshot {
    fn load(backend: &dyn IndexBackend) -> Result<Self> {
        let Some(bytes) = backend.read()? else {
            return Ok(Self {
                records: Vec::new(),
                recovered_corruption: false,
            });
        };

        match serde_json::from_slice::<Vec<IndexRecord>>(&bytes) {
            Ok(records) => Ok(Self {
                records,
                recovered_corruption: false,
            }),
            Err(e) => {
                warn!(
                    "Index at {} is corrupt ({}), starting from an empty index",
                    backend.describe(),
                    e
                );
                Ok(Self {
                    records: Vec::new(),
                    recovered_corruption: true,
                })
            }
        }
    }
}

fn publish_records(backend: &dyn IndexBackend, records: &[IndexRecord]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records)?;
    backend.publish(&bytes)
}

/// The embedding index with idempotent append, rebuild and search.
pub struct IndexStore {
    backend: Arc<dyn IndexBackend>,
    write_lock: Arc<Mutex<()>>,
}

impl IndexStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a store backed by a JSON file at `path`.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let backend = FileBackend::new(path)?;
        info!("Opened index at {:?}", path);
        Ok(Self::new(Arc::new(backend)))
    }

    /// Create a store kept entirely in memory (useful for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Insert `record` unless its source is already indexed.
    ///
    /// The presence check runs against the snapshot read inside the critical
    /// section, so concurrent appends of the same source insert it once. The
    /// write lock travels with the blocking task and is held until it
    /// finishes, even if this future is dropped.
    #[instrument(skip_all, fields(source = %record.source_id))]
    pub async fn append_if_absent(&self, record: IndexRecord) -> Result<AppendReport> {
        let guard = self.write_lock.clone().lock_owned().await;
        let backend = self.backend.clone();

        tokio::task::spawn_blocking(move || -> Result<AppendReport> {
            let _guard = guard;
            let _lock = backend.lock()?;
            let mut snapshot = Snapshot::load(backend.as_ref())?;
            let recovered_corruption = snapshot.recovered_corruption;

            if snapshot
                .records
                .iter()
                .any(|r| r.source_id == record.source_id)
            {
                debug!("{} already indexed", record.source_id);
                return Ok(AppendReport {
                    outcome: AppendOutcome::AlreadyPresent,
                    recovered_corruption,
                });
            }

            snapshot.records.push(record);
            publish_records(backend.as_ref(), &snapshot.records)?;
            debug!("Published index with {} records", snapshot.records.len());

            Ok(AppendReport {
                outcome: AppendOutcome::Inserted,
                recovered_corruption,
            })
        })
        .await?
    }

    /// Replace the whole index with exactly `records`.
    ///
    /// Prior contents are not consulted; callers deduplicate by source.
    #[instrument(skip_all, fields(count = records.len()))]
    pub async fn rebuild(&self, records: Vec<IndexRecord>) -> Result<usize> {
        let guard = self.write_lock.clone().lock_owned().await;
        let backend = self.backend.clone();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let _guard = guard;
            let _lock = backend.lock()?;
            publish_records(backend.as_ref(), &records)?;
            info!("Rebuilt index with {} records", records.len());
            Ok(records.len())
        })
        .await?
    }

    /// Read the current snapshot without taking the write lock.
    pub async fn records(&self) -> Result<Vec<IndexRecord>> {
        let backend = self.backend.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || Snapshot::load(backend.as_ref())).await??;
        Ok(snapshot.records)
    }

    /// Return the `top_k` records most similar to `query_vector`.
    pub async fn search(&self, query_vector: &[f64], top_k: usize) -> Result<Vec<SearchResult>> {
        let records = self.records().await?;
        Ok(search::rank(&records, query_vector, top_k, None))
    }

    /// Like [`search`](Self::search), dropping results below `min_score`.
    pub async fn search_with_threshold(
        &self,
        query_vector: &[f64],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<SearchResult>> {
        let records = self.records().await?;
        Ok(search::rank(&records, query_vector, top_k, Some(min_score)))
    }

    /// Check whether a source is indexed in the current snapshot.
    ///
    /// Advisory only; [`append_if_absent`](Self::append_if_absent) re-checks
    /// under the lock.
    pub async fn contains(&self, source_id: &str) -> Result<bool> {
        Ok(self
            .records()
            .await?
            .iter()
            .any(|r| r.source_id == source_id))
    }

    /// Source ids in index order.
    pub async fn list_sources(&self) -> Result<Vec<String>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .map(|r| r.source_id)
            .collect())
    }

    /// Number of indexed records.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.records().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MurmurError;

    fn record(source: &str, vector: Vec<f64>) -> IndexRecord {
        IndexRecord::new(source, format!("text of {source}"), vector)
    }

    #[test]
    fn test_record_wire_format() {
        let json = serde_json::to_value(record("a.json", vec![0.5, 1.0])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"embedding": [0.5, 1.0], "text": "text of a.json", "source": "a.json"})
        );
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = IndexStore::in_memory();

        let first = store
            .append_if_absent(record("a.json", vec![1.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(first.outcome, AppendOutcome::Inserted);

        let second = store
            .append_if_absent(IndexRecord::new("a.json", "different text", vec![0.0, 1.0]))
            .await
            .unwrap();
        assert_eq!(second.outcome, AppendOutcome::AlreadyPresent);

        let records = store.records().await.unwrap();
        assert_eq!(records, vec![record("a.json", vec![1.0, 0.0])]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_of_same_source_insert_once() {
        let store = Arc::new(IndexStore::in_memory());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_if_absent(record("same.json", vec![1.0]))
                        .await
                        .unwrap()
                        .outcome
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == AppendOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.list_sources().await.unwrap(), vec!["same.json"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_no_update() {
        let store = Arc::new(IndexStore::in_memory());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_if_absent(record(&format!("{i}.json"), vec![i as f64, 1.0]))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut sources = store.list_sources().await.unwrap();
        sources.sort();
        let mut expected: Vec<String> = (0..16).map(|i| format!("{i}.json")).collect();
        expected.sort();
        assert_eq!(sources, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_appends_lose_no_update() {
        let store = Arc::new(IndexStore::in_memory());

        for round in 0..20 {
            let cancelled = {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_if_absent(record(&format!("cancelled-{round}.json"), vec![1.0]))
                        .await
                })
            };
            tokio::task::yield_now().await;
            cancelled.abort();

            store
                .append_if_absent(record(&format!("kept-{round}.json"), vec![1.0]))
                .await
                .unwrap();
        }

        // Wait for blocking writes left behind by aborted callers.
        let _ = store.write_lock.clone().lock_owned().await;

        let sources = store.list_sources().await.unwrap();
        for round in 0..20 {
            assert!(sources.contains(&format!("kept-{round}.json")), "{round}");
        }
        let mut unique = sources.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), sources.len());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_recovered_as_empty() {
        let backend = Arc::new(MemoryBackend::with_contents(b"[{\"embedding\": [1.0"));
        let store = IndexStore::new(backend.clone());

        let report = store
            .append_if_absent(record("new.json", vec![1.0]))
            .await
            .unwrap();
        assert_eq!(report.outcome, AppendOutcome::Inserted);
        assert!(report.recovered_corruption);

        let records = store.records().await.unwrap();
        assert_eq!(records, vec![record("new.json", vec![1.0])]);

        let second = store
            .append_if_absent(record("other.json", vec![1.0]))
            .await
            .unwrap();
        assert!(!second.recovered_corruption);
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_prior_index() {
        let backend = Arc::new(MemoryBackend::new());
        let store = IndexStore::new(backend.clone());
        store
            .append_if_absent(record("kept.json", vec![1.0]))
            .await
            .unwrap();

        backend.fail_publish(true);
        let err = store
            .append_if_absent(record("lost.json", vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, MurmurError::Persist(_)));
        assert_eq!(store.list_sources().await.unwrap(), vec!["kept.json"]);

        backend.fail_publish(false);
        let retry = store
            .append_if_absent(record("lost.json", vec![1.0]))
            .await
            .unwrap();
        assert_eq!(retry.outcome, AppendOutcome::Inserted);
        assert_eq!(
            store.list_sources().await.unwrap(),
            vec!["kept.json", "lost.json"]
        );
    }

    #[tokio::test]
    async fn test_rebuild_replaces_contents() {
        let store = IndexStore::in_memory();
        store
            .append_if_absent(record("old.json", vec![1.0]))
            .await
            .unwrap();

        let count = store
            .rebuild(vec![record("b.json", vec![0.0, 1.0]), record("a.json", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.list_sources().await.unwrap(), vec!["b.json", "a.json"]);

        store.rebuild(Vec::new()).await.unwrap();
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_search_on_store() {
        let store = IndexStore::in_memory();
        store
            .rebuild(vec![
                IndexRecord::new("a.json", "budget review", vec![0.9, 0.1]),
                IndexRecord::new("b.json", "hiring plan", vec![0.1, 0.9]),
            ])
            .await
            .unwrap();

        let results = store.search(&[0.8, 0.2], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "a.json");
        assert_eq!(results[0].text, "budget review");

        let all = store.search(&[0.8, 0.2], DEFAULT_TOP_K).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(store.contains("b.json").await.unwrap());
        assert!(!store.contains("c.json").await.unwrap());
    }
}
