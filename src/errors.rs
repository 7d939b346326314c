//! Crate-wide error taxonomy.
//!
//! A single `thiserror`-derived enum covers every failure mode reachable
//! from an HTTP handler, in the style of [`crate::auth::errors::AuthError`]:
//! a flat set of variants, each carrying its own `#[error("...")]` message,
//! with `status_code()`/`error_code()` pure-function mappings to the wire
//! representation instead of a class hierarchy of error types.
//!
//! Component-local error enums (`SnapshotError`, `FetchError`, `CacheError`,
//! `AuthError`, `WebhookError`) convert into `ProviderError` via `From`, so
//! components can stay decoupled from the HTTP envelope shape.

use serde::Serialize;
use thiserror::Error;

use crate::auth::errors::AuthError;
use crate::cache::CacheError;
use crate::fetch::FetchError;
use crate::http::webhook::WebhookError;
use crate::snapshot::errors::SnapshotError;

/// Result type used throughout the crate's fallible request paths.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Every error an HTTP handler can surface, mapped to a stable wire code.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No validator accepted the request's credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested document, resource, or file does not exist in the active snapshot.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request or configuration failed validation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// `--source-type local` directory is missing, unreadable, or escapes the data root.
    #[error("Local directory error: {0}")]
    LocalDirectoryError(String),

    /// GitHub rejected credentials or denied access to the configured repository.
    #[error("GitHub access error: {0}")]
    GithubAccessError(String),

    /// A file requested from GitHub does not exist at the given ref.
    #[error("GitHub file not found: {0}")]
    GithubFileNotFound(String),

    /// A directory requested from GitHub does not exist at the given ref.
    #[error("GitHub directory not found: {0}")]
    GithubDirectoryNotFound(String),

    /// Network failure while talking to GitHub.
    #[error("GitHub network error: {0}")]
    GithubNetworkError(String),

    /// Swap or fetch ran out of disk space.
    #[error("Disk space error: {0}")]
    DiskSpaceError(String),

    /// Allocation failure while building an in-memory document.
    #[error("Memory error: {0}")]
    MemoryError(String),

    /// An operation exceeded its deadline (readiness gate, network call).
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Catch-all for failures with no more specific taxonomy entry.
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl ProviderError {
    /// HTTP status code for this error, per the wire taxonomy.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Unauthorized => 401,
            ProviderError::NotFound(_) => 404,
            ProviderError::ValidationError(_) => 400,
            ProviderError::LocalDirectoryError(_) => 400,
            ProviderError::GithubAccessError(_) => 403,
            ProviderError::GithubFileNotFound(_) => 404,
            ProviderError::GithubDirectoryNotFound(_) => 404,
            ProviderError::GithubNetworkError(_) => 503,
            ProviderError::DiskSpaceError(_) => 507,
            ProviderError::MemoryError(_) => 507,
            ProviderError::TimeoutError(_) => 503,
            ProviderError::InternalServerError(_) => 500,
        }
    }

    /// Stable string code for this error, used in the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            ProviderError::Unauthorized => "UNAUTHORIZED",
            ProviderError::NotFound(_) => "NOT_FOUND",
            ProviderError::ValidationError(_) => "VALIDATION_ERROR",
            ProviderError::LocalDirectoryError(_) => "LOCAL_DIRECTORY_ERROR",
            ProviderError::GithubAccessError(_) => "GITHUB_ACCESS_ERROR",
            ProviderError::GithubFileNotFound(_) => "GITHUB_FILE_NOT_FOUND",
            ProviderError::GithubDirectoryNotFound(_) => "GITHUB_DIRECTORY_NOT_FOUND",
            ProviderError::GithubNetworkError(_) => "GITHUB_NETWORK_ERROR",
            ProviderError::DiskSpaceError(_) => "DISK_SPACE_ERROR",
            ProviderError::MemoryError(_) => "MEMORY_ERROR",
            ProviderError::TimeoutError(_) => "TIMEOUT_ERROR",
            ProviderError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Builds the `{error: {code, message, target?, details?}}` response body.
    pub fn into_envelope(self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                target: None,
                details: Vec::new(),
            },
        }
    }

    /// Attaches a `target` field (e.g. the offending request path) to the envelope.
    pub fn into_envelope_with_target(self, target: impl Into<String>) -> ErrorEnvelope {
        let mut envelope = self.into_envelope();
        envelope.error.target = Some(target.into());
        envelope
    }
}

/// `{error: {code, message, target?, details?}}` response body.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<AuthError> for ProviderError {
    fn from(err: AuthError) -> Self {
        ProviderError::Unauthorized.log_and_keep(err)
    }
}

impl From<SnapshotError> for ProviderError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Io(msg) => ProviderError::InternalServerError(msg),
            SnapshotError::Validation(msg) => ProviderError::ValidationError(msg),
            SnapshotError::Manifest(msg) => ProviderError::InternalServerError(msg),
            SnapshotError::DiskSpace(msg) => ProviderError::DiskSpaceError(msg),
        }
    }
}

impl From<FetchError> for ProviderError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::LocalDirectory(msg) => ProviderError::LocalDirectoryError(msg),
            FetchError::Access(msg) => ProviderError::GithubAccessError(msg),
            FetchError::FileNotFound(msg) => ProviderError::GithubFileNotFound(msg),
            FetchError::DirectoryNotFound(msg) => ProviderError::GithubDirectoryNotFound(msg),
            FetchError::Network(msg) => ProviderError::GithubNetworkError(msg),
            FetchError::Aborted => {
                ProviderError::InternalServerError("fetch aborted by newer trigger".into())
            }
        }
    }
}

impl From<CacheError> for ProviderError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(target) => ProviderError::NotFound(target),
            CacheError::WarmFailed(_) | CacheError::Cancelled => {
                ProviderError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<WebhookError> for ProviderError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::BadSignature => ProviderError::Unauthorized,
            WebhookError::DifferentRepository => {
                ProviderError::ValidationError("different repository".into())
            }
            WebhookError::DifferentBranch => {
                ProviderError::ValidationError("different branch".into())
            }
            WebhookError::MissingBody => ProviderError::ValidationError("missing body".into()),
            WebhookError::SchedulerError(msg) => ProviderError::InternalServerError(msg),
        }
    }
}

impl axum::response::IntoResponse for ProviderError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.into_envelope())).into_response()
    }
}

/// Helper trait used only to attach a debug-logged source without widening
/// the public `From` surface. Logs at ERROR and returns `self` unchanged.
trait LogAndKeep {
    fn log_and_keep<E: std::fmt::Display>(self, source: E) -> Self;
}

impl LogAndKeep for ProviderError {
    fn log_and_keep<E: std::fmt::Display>(self, source: E) -> Self {
        crate::observability::Logger::error(
            "auth_failed",
            &[("reason", &source.to_string())],
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ProviderError::Unauthorized.status_code(), 401);
        assert_eq!(ProviderError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ProviderError::ValidationError("x".into()).status_code(), 400);
        assert_eq!(ProviderError::GithubAccessError("x".into()).status_code(), 403);
        assert_eq!(ProviderError::GithubNetworkError("x".into()).status_code(), 503);
        assert_eq!(ProviderError::DiskSpaceError("x".into()).status_code(), 507);
        assert_eq!(ProviderError::InternalServerError("x".into()).status_code(), 500);
    }

    #[test]
    fn envelope_omits_absent_target_and_details() {
        let envelope = ProviderError::Unauthorized.into_envelope();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
        assert!(json["error"].get("target").is_none());
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn envelope_with_target() {
        let envelope =
            ProviderError::NotFound("missing".into()).into_envelope_with_target("/ord/v1/x");
        assert_eq!(envelope.error.target.as_deref(), Some("/ord/v1/x"));
    }

    #[test]
    fn cache_not_found_maps_to_404_not_500() {
        let err: ProviderError = CacheError::NotFound("documents/x.json".into()).into();
        assert_eq!(err.status_code(), 404);
    }
}
