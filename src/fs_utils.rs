use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ArchiveError;

/// Create `dir` (and parents) if missing and return its absolute, canonical path.
pub async fn ensure_dir(dir: &Path) -> Result<PathBuf, ArchiveError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ArchiveError::io(dir, e))?;
    tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| ArchiveError::io(dir, e))
}

/// Remove every regular file directly inside `dir`, leaving the directory itself.
///
/// Subdirectories are left alone; the cache never creates any.
pub async fn clear_files(dir: &Path) -> Result<usize, ArchiveError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ArchiveError::io(dir, e))?;
    let mut removed = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ArchiveError::io(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        if !file_type.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry while clearing");
            continue;
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;
        removed += 1;
    }

    Ok(removed)
}
