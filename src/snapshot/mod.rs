//! Snapshot Store (C1): the durable, atomically-swapped view of the
//! currently served content.
//!
//! A fixed data root holds `current/` (a symlink to the active snapshot),
//! `staging/` (in-progress fetch target), and `metadata.json`. `swap`
//! replaces `current` as a single `rename` of a freshly created symlink,
//! so concurrent readers of [`SnapshotStore::current_path`] always observe
//! either the old or the new snapshot, never a partial one.

mod checksum;
mod creator;
pub mod errors;
mod manifest;

pub use checksum::{compute_file_checksum, directory_tree_sha};
pub use errors::{SnapshotError, SnapshotResult};
pub use manifest::SnapshotMetadata;

use std::path::{Path, PathBuf};

/// Handle onto a data root's snapshot lifecycle.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_dir: PathBuf,
    documents_subdirectory: String,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>, documents_subdirectory: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            documents_subdirectory: documents_subdirectory.into(),
        }
    }

    /// Creates a fresh, empty staging directory, removing any leftover one.
    pub fn prepare_staging(&self) -> SnapshotResult<PathBuf> {
        creator::prepare_staging(&self.data_dir)
    }

    /// Removes the staging directory without recreating it. Call once at
    /// startup to satisfy "`staging/` must be cleaned on startup".
    pub fn cleanup_staging(&self) -> SnapshotResult<()> {
        creator::cleanup_staging(&self.data_dir)
    }

    /// Validates a staged fetch before it is eligible to become current.
    pub fn validate(&self, staging: &Path) -> SnapshotResult<()> {
        creator::validate(staging, &self.documents_subdirectory)
    }

    /// Publishes `staging` as the new current snapshot and persists its
    /// metadata. `commit_hash`/`branch`/`repository` describe the fetch
    /// that produced it (empty strings for a `local` source).
    pub fn swap(
        &self,
        staging: &Path,
        commit_hash: &str,
        branch: &str,
        repository: &str,
    ) -> SnapshotResult<(PathBuf, SnapshotMetadata)> {
        let commit_hash = commit_hash.to_string();
        let branch = branch.to_string();
        let repository = repository.to_string();
        creator::publish(&self.data_dir, staging, move |snapshot_dir, total_files| {
            let tree_sha =
                directory_tree_sha(snapshot_dir).unwrap_or_else(|_| "sha256:unknown".to_string());
            SnapshotMetadata::new(
                commit_hash.clone(),
                tree_sha,
                branch.clone(),
                repository.clone(),
                total_files,
            )
        })
    }

    /// Resolves `current` to its target directory, if a snapshot has been
    /// published.
    pub fn current_path(&self) -> Option<PathBuf> {
        creator::resolve_current(&self.data_dir)
    }

    /// Reads the last-persisted metadata, if any.
    pub fn metadata(&self) -> SnapshotResult<Option<SnapshotMetadata>> {
        let path = creator::metadata_path(&self.data_dir);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(SnapshotMetadata::read_from_file(&path)?))
    }

    /// The active snapshot's directory-tree digest, used as the cache's
    /// generation token. `None` if no snapshot has been published yet.
    pub fn current_version(&self) -> Option<String> {
        self.metadata().ok().flatten().map(|m| m.directory_tree_sha)
    }
}
