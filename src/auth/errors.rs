//! Authentication error taxonomy.

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failure reasons across every configured authenticator. All map to 401
/// at the HTTP boundary (see [`crate::errors::ProviderError`]); the
/// variants exist for logging and testing, not status-code branching.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("no credentials presented")]
    MissingCredentials,

    #[error("malformed Authorization header")]
    MalformedHeader,

    #[error("unknown basic-auth user '{0}'")]
    UnknownUser(String),

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("no client certificate presented")]
    MissingCertificate,

    #[error("client certificate subject '{0}' is not in the trusted list")]
    UntrustedSubject(String),

    #[error("client certificate issuer '{0}' is not trusted")]
    UntrustedIssuer(String),

    #[error("no authenticator configured for this request")]
    NoValidatorConfigured,
}
