//! Authenticator (C9): composes the configured validators with OR
//! semantics — a request is authenticated if any one of them accepts it.

pub mod basic;
pub mod errors;
pub mod mtls;

pub use errors::{AuthError, AuthResult};

use basic::BasicAuthenticator;
use mtls::{MtlsAuthenticator, MtlsHeaders};

/// Headers relevant to authentication, extracted once per request.
pub struct AuthHeaders<'a> {
    pub authorization: Option<&'a str>,
    pub mtls: MtlsHeaders<'a>,
}

/// OR-composition of the configured authenticators. `Open` carries no
/// validators, so every request passes.
pub struct Authenticator {
    basic: Option<BasicAuthenticator>,
    mtls: Option<MtlsAuthenticator>,
}

impl Authenticator {
    pub fn open() -> Self {
        Self {
            basic: None,
            mtls: None,
        }
    }

    pub fn new(basic: Option<BasicAuthenticator>, mtls: Option<MtlsAuthenticator>) -> Self {
        Self { basic, mtls }
    }

    pub fn is_open(&self) -> bool {
        self.basic.is_none() && self.mtls.is_none()
    }

    /// Returns `Ok(())` if any configured validator accepts the request,
    /// or the last validator's error if none did (or none are configured
    /// and the server isn't running in open mode).
    pub fn authenticate(&self, headers: AuthHeaders<'_>) -> AuthResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let mut last_error = AuthError::NoValidatorConfigured;

        if let Some(basic) = &self.basic {
            match basic.verify(headers.authorization) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }

        if let Some(mtls) = &self.mtls {
            match mtls.verify(headers.mtls) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }
}
