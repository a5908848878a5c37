//! Filesystem helpers shared across modules.
//!
//! These helpers attach the operation and path to IO errors and keep the
//! best-effort delete semantics in one place.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_path("creating directory", path, e))
}

/// Ensure a directory exists (synchronous variant).
pub fn ensure_dir_all_sync(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path("creating directory", path, e))
}

/// Delete a file, treating "already gone" and any other failure as
/// non-fatal. Returns whether a file was actually removed.
pub async fn remove_file_best_effort(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            false
        }
    }
}

/// Best-effort delete of every file directly inside `dir` whose name
/// starts with `prefix`. Returns how many were removed.
pub async fn remove_files_with_prefix(dir: &Path, prefix: &str) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if matches && remove_file_best_effort(&entry.path()).await {
            removed += 1;
        }
    }
    removed
}

/// Regular files directly inside `dir` last modified more than `max_age` ago.
pub async fn files_older_than(dir: &Path, max_age: Duration) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io_path("reading directory", dir, e)),
    };

    let now = SystemTime::now();
    let mut stale = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io_path("reading directory", dir, e))?
    {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age > max_age {
            stale.push(entry.path());
        }
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_file_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        tokio::fs::write(&path, b"x").await.unwrap();

        assert!(remove_file_best_effort(&path).await);
        assert!(!path.exists());
        assert!(!remove_file_best_effort(&path).await);
    }

    #[tokio::test]
    async fn test_remove_files_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cid.webm.part", "cid.m4a", "other.mp3"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        assert_eq!(remove_files_with_prefix(dir.path(), "cid.").await, 2);
        assert!(dir.path().join("other.mp3").exists());
        assert_eq!(remove_files_with_prefix(&dir.path().join("missing"), "cid.").await, 0);
    }

    #[tokio::test]
    async fn test_files_older_than() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("fresh.mp3"), b"x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("archives")).await.unwrap();

        let stale = files_older_than(dir.path(), Duration::from_secs(3600)).await.unwrap();
        assert!(stale.is_empty());

        let stale = files_older_than(&dir.path().join("missing"), Duration::ZERO).await.unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_dir_all() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir_all(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_dir_all_sync(&nested).unwrap();
    }
}
