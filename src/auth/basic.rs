//! HTTP Basic authentication against a configured user -> bcrypt-hash map.

use std::collections::HashMap;

use base64::Engine;

use super::errors::{AuthError, AuthResult};

pub struct BasicAuthenticator {
    users: HashMap<String, String>,
}

impl BasicAuthenticator {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Verifies a raw `Authorization` header value, expected to be
    /// `Basic <base64(user:pass)>`.
    pub fn verify(&self, authorization_header: Option<&str>) -> AuthResult<()> {
        let header = authorization_header.ok_or(AuthError::MissingCredentials)?;
        let encoded = header
            .strip_prefix("Basic ")
            .ok_or(AuthError::MalformedHeader)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| AuthError::MalformedHeader)?;
        let credentials = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;
        let (user, password) = credentials
            .split_once(':')
            .ok_or(AuthError::MalformedHeader)?;

        let hash = self
            .users
            .get(user)
            .ok_or_else(|| AuthError::UnknownUser(user.to_string()))?;

        match bcrypt::verify(password, hash) {
            Ok(true) => Ok(()),
            _ => Err(AuthError::IncorrectPassword),
        }
    }
}
