//! Transient on-disk storage for uploaded documents.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while persisting an uploaded document.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create storage directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Store for transient uploaded documents.
///
/// Each saved payload gets a fresh UUID-keyed path under the storage root,
/// so concurrent requests never collide. Every caller of [`save`] must pair
/// it with a [`remove`] on all exit paths; the file's lifetime is bounded by
/// the request (or background task) that created it.
///
/// [`save`]: DocumentStore::save
/// [`remove`]: DocumentStore::remove
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an uploaded payload under a fresh collision-free path.
    ///
    /// Creates the storage root on demand. Any I/O failure here is fatal to
    /// the request and surfaces as [`StorageError`].
    pub fn save(&self, payload: &[u8]) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let path = self.root.join(format!("{}.pdf", Uuid::new_v4()));
        std::fs::write(&path, payload).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Delete a stored document.
    ///
    /// Idempotent: removing a missing path is a no-op. Other failures are
    /// logged and swallowed; cleanup must never abort a request.
    pub fn remove(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "failed to remove stored document {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}
