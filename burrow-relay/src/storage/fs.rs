//! Filesystem payload store.
//!
//! Layout: `<root>/<transfer_id>/<filename>`.

use super::PayloadStore;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use burrow_types::TransferId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Payload store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsPayloadStore {
    root: PathBuf,
}

impl FsPayloadStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(&root, e))?;
        tracing::info!("Staging fallback payloads under {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn transfer_dir(&self, transfer_id: &TransferId) -> PathBuf {
        self.root.join(transfer_id.to_string())
    }
}

#[async_trait]
impl PayloadStore for FsPayloadStore {
    async fn stage(
        &self,
        transfer_id: &TransferId,
        filename: &str,
        payload: &[u8],
    ) -> StorageResult<PathBuf> {
        let dir = self.transfer_dir(transfer_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let path = dir.join(filename);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::debug!("Staged {} bytes at {}", payload.len(), path.display());
        Ok(path)
    }

    async fn load(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn purge(&self, path: &Path) -> StorageResult<bool> {
        let removed = match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(io_error(path, e)),
        };

        // Drop the per-transfer directory once it is empty. Other files in
        // it belong to someone else and stay.
        if let Some(dir) = path.parent().filter(|dir| dir.parent() == Some(self.root.as_path())) {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                if e.kind() != ErrorKind::NotFound {
                    tracing::debug!("Keeping {}: {}", dir.display(), e);
                }
            }
        }

        Ok(removed)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}
