//! Directory-tree hashing for snapshot identity and cache keys.
//!
//! Two snapshots with identical contents and modification times must hash
//! identically: the digest is computed over the sorted set of
//! `(relative_path, mtime_ns)` pairs, not file bytes, so it stays cheap
//! enough to recompute on every cache lookup.

use std::path::Path;

use sha2::{Digest, Sha256};

use super::errors::{SnapshotError, SnapshotResult};

/// Computes the SHA-256 checksum of a single file's contents.
pub fn compute_file_checksum(path: &Path) -> SnapshotResult<String> {
    let bytes = std::fs::read(path).map_err(SnapshotError::from)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format_checksum(hasher.finalize().into()))
}

/// Formats a raw SHA-256 digest as `sha256:<hex>`.
pub fn format_checksum(digest: [u8; 32]) -> String {
    let mut out = String::with_capacity(7 + 64);
    out.push_str("sha256:");
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Parses a `sha256:<hex>`-formatted checksum back to its hex digits.
pub fn parse_checksum(formatted: &str) -> Option<&str> {
    formatted.strip_prefix("sha256:")
}

/// Computes a deterministic digest over every regular file under `root`,
/// keyed by `(relative_path, mtime_ns)` pairs sorted by path.
///
/// This is the "directory tree sha" referenced by the snapshot metadata and
/// used by the cache as its generation token.
pub fn directory_tree_sha(root: &Path) -> SnapshotResult<String> {
    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort_by(|a: &(String, i128), b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relative_path, mtime_ns) in &entries {
        hasher.update(relative_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(mtime_ns.to_le_bytes());
        hasher.update(b"\n");
    }
    Ok(format_checksum(hasher.finalize().into()))
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, i128)>) -> SnapshotResult<()> {
    let entries = std::fs::read_dir(dir).map_err(SnapshotError::from)?;
    for entry in entries {
        let entry = entry.map_err(SnapshotError::from)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(SnapshotError::from)?;

        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(SnapshotError::from)?;
            let mtime_ns = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as i128)
                .unwrap_or(0);
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            out.push((relative, mtime_ns));
        }
    }
    Ok(())
}

/// Counts the regular files under `root`, recursively.
pub fn count_files(root: &Path) -> SnapshotResult<usize> {
    let mut count = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).map_err(SnapshotError::from)? {
            let entry = entry.map_err(SnapshotError::from)?;
            let file_type = entry.file_type().map_err(SnapshotError::from)?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                count += 1;
            }
        }
    }
    Ok(count)
}
