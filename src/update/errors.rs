//! Update scheduler error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("an update is already in progress")]
    AlreadyInProgress,

    #[error(transparent)]
    Fetch(#[from] crate::fetch::FetchError),

    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::errors::SnapshotError),
}
