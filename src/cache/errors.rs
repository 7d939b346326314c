//! Cache error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache warming failed: {0}")]
    WarmFailed(String),

    #[error("cache warming was cancelled")]
    Cancelled,

    /// The document a build callback tried to read does not exist, or its
    /// requested path escaped the snapshot root. Kept distinct from
    /// `WarmFailed` so the HTTP layer can map it to 404 instead of 500.
    #[error("not found: {0}")]
    NotFound(String),
}
