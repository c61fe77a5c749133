//! Durable storage for the lake: filesystem plumbing and the parquet codec.
//!
//! Stages never touch files directly; they go through this module so the
//! on-disk conventions live in one place:
//!
//! - [`list_files_sorted`]: intake listing in the stable order the bronze
//!   dedup tie-break is defined against
//! - [`latest_modified`]: snapshot selection for the silver stage
//! - [`parquet`]: RecordBatch conversions and parquet read/write
//!
//! A missing directory reads as empty rather than as an error; the tree
//! is created lazily by whichever stage writes first.

pub mod parquet;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;

use crate::error::Result;

/// List the files directly under `dir`, sorted by file name.
///
/// File-name order is the pipeline's stable intake order: directory
/// iteration order is platform-dependent, and the bronze dedup tie-break
/// needs a reproducible concatenation order. Subdirectories are skipped;
/// a missing `dir` yields an empty list.
pub async fn list_files_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// The most recently modified file under `dir` carrying `extension`.
///
/// Ties on modification time keep the name-order winner. Returns `None`
/// when the directory is missing or holds no matching file.
pub async fn latest_modified(dir: &Path, extension: &str) -> Result<Option<PathBuf>> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for path in list_files_sorted(dir).await? {
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let modified = fs::metadata(&path).await?.modified()?;
        let newer = match &latest {
            Some((current, _)) => modified > *current,
            None => true,
        };
        if newer {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_files_sorted_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = list_files_sorted(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_list_files_sorted_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        let files = list_files_sorted(&missing).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_latest_modified_picks_newest_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("2024-03-05.parquet");
        let newer = dir.path().join("2024-03-04.parquet");
        std::fs::write(&older, "old").unwrap();
        std::fs::write(&newer, "new").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        // Force distinct mtimes regardless of filesystem resolution.
        let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        let file = std::fs::File::options().write(true).open(&older).unwrap();
        file.set_modified(earlier).unwrap();

        let latest = latest_modified(dir.path(), "parquet").await.unwrap();
        assert_eq!(latest, Some(newer));
    }

    #[tokio::test]
    async fn test_latest_modified_none_when_no_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let latest = latest_modified(dir.path(), "parquet").await.unwrap();
        assert_eq!(latest, None);
    }
}
