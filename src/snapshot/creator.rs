//! Snapshot store internals: staging, validation, and the atomic publish
//! (rename) step.
//!
//! The publish sequence mirrors the fsync-then-rename discipline used
//! elsewhere in this codebase for atomic visibility: content is fully
//! written and fsynced under a name nobody looks up (`snapshots/<hash>/`),
//! then a single `rename` repoints the `current` symlink onto it. Readers
//! that resolved `current` before the rename keep seeing the old target;
//! readers that resolve it after see the new one. Neither sees a partial
//! directory.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use super::checksum::{count_files, directory_tree_sha};
use super::errors::{SnapshotError, SnapshotResult};
use super::manifest::SnapshotMetadata;

const CURRENT_LINK: &str = "current";
const STAGING_DIR: &str = "staging";
const SNAPSHOTS_DIR: &str = "snapshots";
const METADATA_FILE: &str = "metadata.json";

fn fsync_dir(path: &Path) -> SnapshotResult<()> {
    let dir = fs::OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(SnapshotError::from)?;
    dir.sync_all().map_err(SnapshotError::from)
}

pub fn staging_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STAGING_DIR)
}

pub fn snapshots_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOTS_DIR)
}

pub fn current_link(data_dir: &Path) -> PathBuf {
    data_dir.join(CURRENT_LINK)
}

pub fn metadata_path(data_dir: &Path) -> PathBuf {
    data_dir.join(METADATA_FILE)
}

/// Removes any leftover staging directory, then creates a fresh empty one.
/// Per the "`staging/` ... must be cleaned on startup" requirement.
pub fn prepare_staging(data_dir: &Path) -> SnapshotResult<PathBuf> {
    let staging = staging_path(data_dir);
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(SnapshotError::from)?;
    }
    fs::create_dir_all(&staging).map_err(SnapshotError::from)?;
    Ok(staging)
}

/// Removes the staging directory if present, without recreating it.
pub fn cleanup_staging(data_dir: &Path) -> SnapshotResult<()> {
    let staging = staging_path(data_dir);
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(SnapshotError::from)?;
    }
    Ok(())
}

/// Validates a staging directory: the configured documents subdirectory
/// must exist, be non-empty, and contain at least one `.json` file that
/// parses and carries a truthy `openResourceDiscovery` property.
pub fn validate(staging: &Path, documents_subdirectory: &str) -> SnapshotResult<()> {
    let docs_dir = staging.join(documents_subdirectory);
    if !docs_dir.is_dir() {
        return Err(SnapshotError::Validation(format!(
            "documents subdirectory '{}' missing from staged content",
            documents_subdirectory
        )));
    }

    let entries: Vec<_> = fs::read_dir(&docs_dir)
        .map_err(SnapshotError::from)?
        .filter_map(|e| e.ok())
        .collect();
    if entries.is_empty() {
        return Err(SnapshotError::Validation(
            "documents subdirectory is empty".into(),
        ));
    }

    let has_valid_document = entries.iter().any(|entry| {
        let path = entry.path();
        path.extension().and_then(|e| e.to_str()) == Some("json")
            && fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
                .and_then(|v| v.get("openResourceDiscovery").cloned())
                .map(|v| !v.is_null() && v != serde_json::Value::Bool(false))
                .unwrap_or(false)
    });

    if !has_valid_document {
        return Err(SnapshotError::Validation(
            "no document in the staged content parses as JSON with a truthy \
             'openResourceDiscovery' property"
                .into(),
        ));
    }

    Ok(())
}

/// Publishes a validated staging directory as the new current snapshot.
///
/// Moves `staging` to `snapshots/<directoryTreeSha>/`, writes `metadata.json`
/// inside the data root, and atomically repoints the `current` symlink onto
/// the new snapshot directory via `rename` of a freshly created temporary
/// symlink. Returns the published snapshot's path.
pub fn publish(
    data_dir: &Path,
    staging: &Path,
    mut metadata_builder: impl FnMut(&Path, usize) -> SnapshotMetadata,
) -> SnapshotResult<(PathBuf, SnapshotMetadata)> {
    let tree_sha = directory_tree_sha(staging)?;
    let total_files = count_files(staging)?;

    let snapshots = snapshots_dir(data_dir);
    fs::create_dir_all(&snapshots).map_err(SnapshotError::from)?;

    let snapshot_name = super::checksum::parse_checksum(&tree_sha).unwrap_or(&tree_sha);
    let snapshot_dir = snapshots.join(snapshot_name);

    if snapshot_dir.exists() {
        fs::remove_dir_all(&snapshot_dir).map_err(SnapshotError::from)?;
    }
    fs::rename(staging, &snapshot_dir).map_err(SnapshotError::from)?;
    fsync_dir(&snapshot_dir)?;

    let metadata = metadata_builder(&snapshot_dir, total_files);
    metadata.write_to_file(&metadata_path(data_dir))?;

    swap_current_symlink(data_dir, &snapshot_dir)?;
    fsync_dir(data_dir)?;

    gc_superseded(&snapshots, &snapshot_dir);

    Ok((snapshot_dir, metadata))
}

fn swap_current_symlink(data_dir: &Path, target: &Path) -> SnapshotResult<()> {
    let link = current_link(data_dir);
    let tmp_link = data_dir.join(format!(".{}.tmp", CURRENT_LINK));

    if fs::symlink_metadata(&tmp_link).is_ok() {
        let _ = fs::remove_file(&tmp_link);
    }
    symlink(target, &tmp_link).map_err(SnapshotError::from)?;
    fs::rename(&tmp_link, &link).map_err(SnapshotError::from)?;
    Ok(())
}

/// Best-effort removal of superseded snapshot directories. Failures are
/// logged by the caller, never surfaced as a publish failure.
fn gc_superseded(snapshots_dir: &Path, keep: &Path) {
    let Ok(entries) = fs::read_dir(snapshots_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path != keep && path.is_dir() {
            let _ = fs::remove_dir_all(&path);
        }
    }
}

/// Resolves `current` to its target snapshot directory, if it exists.
pub fn resolve_current(data_dir: &Path) -> Option<PathBuf> {
    let link = current_link(data_dir);
    fs::canonicalize(&link).ok().filter(|p| p.is_dir())
}
