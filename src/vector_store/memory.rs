//! In-memory index backend.
//!
//! Useful for testing and ephemeral indexes.

use super::{BackendLock, IndexBackend};
use crate::error::{MurmurError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Index backend holding the serialized snapshot in memory.
///
/// Exclusion comes from the owning store's mutex, so a backend must not be
/// shared between several stores.
pub struct MemoryBackend {
    contents: RwLock<Option<Vec<u8>>>,
    fail_publish: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            contents: RwLock::new(None),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Create a backend that already holds `bytes` as its snapshot.
    pub fn with_contents(bytes: &[u8]) -> Self {
        Self {
            contents: RwLock::new(Some(bytes.to_vec())),
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Make subsequent publishes fail, simulating a storage error.
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    fn poisoned() -> MurmurError {
        MurmurError::VectorStore("memory index lock poisoned".to_string())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        let contents = self.contents.read().map_err(|_| Self::poisoned())?;
        Ok(contents.clone())
    }

    fn publish(&self, bytes: &[u8]) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(MurmurError::Persist("simulated storage failure".to_string()));
        }
        let mut contents = self.contents.write().map_err(|_| Self::poisoned())?;
        *contents = Some(bytes.to_vec());
        Ok(())
    }

    fn lock(&self) -> Result<BackendLock> {
        Ok(BackendLock::in_process())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
