//! Snapshot store error types.

use thiserror::Error;

/// Result type for snapshot store operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Failures raised by the snapshot store (C1).
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem operation failed (create/rename/fsync/read).
    #[error("snapshot I/O error: {0}")]
    Io(String),

    /// Staging directory failed `validate()`: missing documents subdirectory,
    /// empty, or no parseable ORD document found within it.
    #[error("invalid snapshot: {0}")]
    Validation(String),

    /// `metadata.json` failed to serialize, deserialize, or write.
    #[error("snapshot metadata error: {0}")]
    Manifest(String),

    /// The filesystem ran out of space while staging or swapping.
    #[error("disk space exhausted during snapshot operation: {0}")]
    DiskSpace(String),
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        if e.raw_os_error() == Some(28) {
            return SnapshotError::DiskSpace(e.to_string());
        }
        SnapshotError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_by_default() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SnapshotError = io_err.into();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn enospc_converts_to_disk_space() {
        let io_err = std::io::Error::from_raw_os_error(28);
        let err: SnapshotError = io_err.into();
        assert!(matches!(err, SnapshotError::DiskSpace(_)));
    }
}
