//! Local resource cache backing the blob downloads.
//!
//! The cache directory doubles as a memo table: a file that already exists
//! is never fetched again, across chapters and across runs.

use std::path::{Path, PathBuf};

use crate::error::ArchiveError;
use crate::fs_utils::ensure_dir;

#[derive(Debug, Clone)]
pub struct ResourceCache {
    root: PathBuf,
}

impl ResourceCache {
    /// Open (creating if needed) the cache rooted at `dir`.
    ///
    /// The root is stored as an absolute path because chapter content refers
    /// to cached files by absolute path.
    pub async fn open(dir: &Path) -> Result<Self, ArchiveError> {
        Ok(Self {
            root: ensure_dir(dir).await?,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn contains(&self, name: &str) -> Result<bool, ArchiveError> {
        let path = self.path(name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ArchiveError::io(path, e))
    }

    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ArchiveError> {
        let path = self.path(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        Ok(path)
    }

    pub async fn read_to_string(&self, name: &str) -> Result<String, ArchiveError> {
        let path = self.path(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ArchiveError::io(path, e))
    }
}
