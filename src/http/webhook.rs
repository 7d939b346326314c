//! Webhook Receiver (C10): `POST /api/v1/webhook/github`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::update::UpdateScheduler;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature")]
    BadSignature,

    #[error("different repository")]
    DifferentRepository,

    #[error("different branch")]
    DifferentBranch,

    #[error("missing request body")]
    MissingBody,

    #[error("scheduler error: {0}")]
    SchedulerError(String),
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    repository: PushEventRepository,
}

#[derive(Debug, Deserialize)]
struct PushEventRepository {
    full_name: String,
}

/// Headers relevant to webhook verification.
pub struct WebhookHeaders<'a> {
    pub manual_trigger: Option<&'a str>,
    pub signature_256: Option<&'a str>,
    pub github_event: Option<&'a str>,
}

pub struct WebhookReceiver {
    secret: Option<String>,
    repository: String,
    branch: String,
}

impl WebhookReceiver {
    pub fn new(secret: Option<String>, repository: String, branch: String) -> Self {
        Self {
            secret,
            repository,
            branch,
        }
    }

    /// Processes an incoming webhook request, scheduling an update on the
    /// scheduler as needed. Returns `Ok(())` on every path that should
    /// reply 200.
    pub async fn handle(
        &self,
        scheduler: &std::sync::Arc<UpdateScheduler>,
        headers: WebhookHeaders<'_>,
        raw_body: &[u8],
    ) -> Result<(), WebhookError> {
        if headers.manual_trigger == Some("true") {
            scheduler.schedule_immediate_update(true).await;
            return Ok(());
        }

        if let Some(secret) = &self.secret {
            let signature = headers.signature_256.ok_or(WebhookError::BadSignature)?;
            verify_signature(secret, raw_body, signature)?;
        }

        if headers.github_event == Some("ping") {
            return Ok(());
        }

        if raw_body.is_empty() {
            return Err(WebhookError::MissingBody);
        }

        let event: PushEvent =
            serde_json::from_slice(raw_body).map_err(|_| WebhookError::MissingBody)?;

        if !event.repository.full_name.eq_ignore_ascii_case(&self.repository) {
            return Err(WebhookError::DifferentRepository);
        }

        let expected_ref = format!("refs/heads/{}", self.branch);
        if event.git_ref != expected_ref {
            return Err(WebhookError::DifferentBranch);
        }

        scheduler.schedule_immediate_update(false).await;
        Ok(())
    }
}

fn verify_signature(secret: &str, body: &[u8], header: &str) -> Result<(), WebhookError> {
    let hex_sig = header
        .strip_prefix("sha256=")
        .ok_or(WebhookError::BadSignature)?;
    let expected_bytes = hex::decode(hex_sig).map_err(|_| WebhookError::BadSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::BadSignature)?;
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if computed.ct_eq(&expected_bytes).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(WebhookError::BadSignature)
    }
}

/// Minimal hex decode so the crate doesn't need a dedicated `hex`
/// dependency for this one call site.
mod hex {
    pub fn decode(s: &str) -> Result<Vec<u8>, ()> {
        if s.len() % 2 != 0 {
            return Err(());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac_hex(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let sig = format!("sha256={}", hmac_hex("shh", body));
        assert!(verify_signature("shh", body, &sig).is_ok());
    }

    #[test]
    fn single_bit_alteration_is_rejected() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let mut sig = hmac_hex("shh", body);
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        let header = format!("sha256={}", sig);
        assert!(verify_signature("shh", body, &header).is_err());
    }

    #[test]
    fn hex_decode_roundtrip() {
        assert_eq!(hex::decode("0a1f").unwrap(), vec![0x0a, 0x1f]);
        assert!(hex::decode("xyz").is_err());
        assert!(hex::decode("abc").is_err());
    }
}
