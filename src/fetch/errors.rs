//! Error taxonomy for the content fetcher.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("configured source is a local directory, not a repository: {0}")]
    LocalDirectory(String),

    #[error("access denied: {0}")]
    Access(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("fetch aborted")]
    Aborted,
}
