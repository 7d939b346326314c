//! Snapshot metadata: the authoritative descriptor written alongside each
//! published snapshot.
//!
//! Format:
//! ```json
//! {
//!   "commitHash": "a1b2c3d",
//!   "directoryTreeSha": "sha256:...",
//!   "fetchTime": "2026-02-04T11:30:00Z",
//!   "branch": "main",
//!   "repository": "owner/repo",
//!   "totalFiles": 42
//! }
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::errors::{SnapshotError, SnapshotResult};

/// Descriptor for a published snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Git commit SHA (or a content hash for local sources).
    pub commit_hash: String,
    /// Digest of the directory tree's `(path, mtime)` pairs.
    pub directory_tree_sha: String,
    /// When the fetch that produced this snapshot completed.
    pub fetch_time: String,
    /// Branch tracked (empty string for `local` sources).
    pub branch: String,
    /// `owner/repo` (empty string for `local` sources).
    pub repository: String,
    /// Total regular files in the snapshot.
    pub total_files: usize,
}

impl SnapshotMetadata {
    /// Builds metadata with `fetchTime` set to now.
    pub fn new(
        commit_hash: impl Into<String>,
        directory_tree_sha: impl Into<String>,
        branch: impl Into<String>,
        repository: impl Into<String>,
        total_files: usize,
    ) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            directory_tree_sha: directory_tree_sha.into(),
            fetch_time: Utc::now().to_rfc3339(),
            branch: branch.into(),
            repository: repository.into(),
            total_files,
        }
    }

    pub fn to_json(&self) -> SnapshotResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::Manifest(format!("failed to serialize metadata: {}", e)))
    }

    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SnapshotError::Manifest(format!("failed to parse metadata: {}", e)))
    }

    /// Writes the metadata to `path`, fsyncing before returning.
    pub fn write_to_file(&self, path: &Path) -> SnapshotResult<()> {
        let json = self.to_json()?;
        let mut file = File::create(path).map_err(SnapshotError::from)?;
        file.write_all(json.as_bytes()).map_err(SnapshotError::from)?;
        file.sync_all().map_err(SnapshotError::from)?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> SnapshotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(SnapshotError::from)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> SnapshotMetadata {
        SnapshotMetadata::new("a1b2c3d", "sha256:deadbeef", "main", "owner/repo", 3)
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = sample().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["commitHash"], "a1b2c3d");
        assert_eq!(parsed["directoryTreeSha"], "sha256:deadbeef");
        assert_eq!(parsed["branch"], "main");
        assert_eq!(parsed["repository"], "owner/repo");
        assert_eq!(parsed["totalFiles"], 3);
        assert!(parsed.get("fetchTime").is_some());
    }

    #[test]
    fn json_roundtrip() {
        let original = sample();
        let json = original.to_json().unwrap();
        let parsed = SnapshotMetadata::from_json(&json).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn write_and_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        let original = sample();
        original.write_to_file(&path).unwrap();
        let loaded = SnapshotMetadata::read_from_file(&path).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(SnapshotMetadata::from_json("not json").is_err());
    }
}
