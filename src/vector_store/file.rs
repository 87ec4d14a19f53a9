//! File-backed index backend.
//!
//! New snapshots are written to a temporary file in the index directory and
//! renamed over the artifact, so a reader opens either the old or the new
//! file, never a partial one. Writers serialize on an exclusive OS lock held
//! on a sidecar `.lock` file, which also covers writers in other processes.

use super::{BackendLock, IndexBackend};
use crate::error::{MurmurError, Result};
use std::fs::{OpenOptions, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Index backend persisting the snapshot as a JSON file.
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBackend {
    /// Create a backend for the index file at `path`.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");

        Ok(Self {
            path: path.to_path_buf(),
            lock_path: path.with_file_name(lock_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Permissions the published file should carry: those of the current
    /// artifact, or 0644 for a new one. Temp files are created 0600.
    fn artifact_permissions(&self) -> Option<Permissions> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(_) => default_permissions(),
        }
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

impl IndexBackend for FileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn publish(&self, bytes: &[u8]) -> Result<()> {
        let persist_err = |e: std::io::Error| {
            MurmurError::Persist(format!("{}: {}", self.path.display(), e))
        };

        let mut tmp = NamedTempFile::new_in(self.directory()).map_err(persist_err)?;
        tmp.write_all(bytes).map_err(persist_err)?;
        if let Some(permissions) = self.artifact_permissions() {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(persist_err)?;
        }
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;

        debug!("Published {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }

    fn lock(&self) -> Result<BackendLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock()?;
        Ok(BackendLock::file(file))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
