//! Cloud Foundry mTLS authentication: trust is established by the
//! platform's reverse proxy, which terminates TLS and forwards the
//! client certificate's issuer/subject DNs plus a verification verdict
//! as headers. This authenticator only has to canonicalize and compare
//! those DNs against a configured trust list.

use std::collections::BTreeSet;

use base64::Engine;

use super::errors::{AuthError, AuthResult};

/// A trusted (issuer, subject) pair plus the root CA that must also match.
#[derive(Debug, Clone)]
pub struct TrustedPair {
    pub issuer: String,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct MtlsAuthenticator {
    trusted_pairs: Vec<TrustedPair>,
    trusted_roots: Vec<String>,
}

/// Headers the reverse proxy attaches to an already-TLS-terminated request.
pub struct MtlsHeaders<'a> {
    pub forwarded_client_cert: Option<&'a str>,
    pub ssl_client: Option<&'a str>,
    pub ssl_client_verify: Option<&'a str>,
    pub issuer_dn_b64: Option<&'a str>,
    pub subject_dn_b64: Option<&'a str>,
    pub root_ca_dn_b64: Option<&'a str>,
}

impl MtlsAuthenticator {
    pub fn new(trusted_pairs: Vec<TrustedPair>, trusted_roots: Vec<String>) -> Self {
        Self {
            trusted_pairs,
            trusted_roots,
        }
    }

    /// Merges additional trust entries fetched from a configured HTTPS
    /// endpoint at startup with the statically configured list.
    pub fn merge(&mut self, pairs: Vec<TrustedPair>, roots: Vec<String>) {
        self.trusted_pairs.extend(pairs);
        self.trusted_roots.extend(roots);
    }

    pub fn verify(&self, headers: MtlsHeaders<'_>) -> AuthResult<()> {
        if headers.forwarded_client_cert.is_none()
            || headers.ssl_client != Some("1")
            || headers.ssl_client_verify != Some("0")
        {
            return Err(AuthError::MissingCertificate);
        }

        let issuer = decode_dn(headers.issuer_dn_b64).ok_or(AuthError::MissingCertificate)?;
        let subject = decode_dn(headers.subject_dn_b64).ok_or(AuthError::MissingCertificate)?;
        let root = decode_dn(headers.root_ca_dn_b64).ok_or(AuthError::MissingCertificate)?;

        let issuer_rdns = canonicalize_dn(&issuer);
        let subject_rdns = canonicalize_dn(&subject);
        let root_rdns = canonicalize_dn(&root);

        let pair_matches = self.trusted_pairs.iter().any(|pair| {
            canonicalize_dn(&pair.issuer) == issuer_rdns
                && canonicalize_dn(&pair.subject) == subject_rdns
        });
        if !pair_matches {
            return Err(AuthError::UntrustedSubject(subject));
        }

        let root_matches = self
            .trusted_roots
            .iter()
            .any(|trusted| canonicalize_dn(trusted) == root_rdns);
        if !root_matches {
            return Err(AuthError::UntrustedIssuer(root));
        }

        Ok(())
    }
}

fn decode_dn(header: Option<&str>) -> Option<String> {
    let encoded = header?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// Splits a DN into RDN tokens on `,` or `/`, uppercases the attribute key,
/// lowercases the value, and returns them as a multiset so ordering and
/// case differences between proxies don't cause spurious mismatches.
fn canonicalize_dn(dn: &str) -> BTreeSet<(String, String)> {
    dn.split([',', '/'])
        .map(str::trim)
        .filter(|rdn| !rdn.is_empty())
        .filter_map(|rdn| {
            let (key, value) = rdn.split_once('=')?;
            Some((key.trim().to_uppercase(), value.trim().to_lowercase()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(raw)
    }

    fn headers<'a>(issuer: &'a str, subject: &'a str, root: &'a str) -> MtlsHeaders<'a> {
        MtlsHeaders {
            forwarded_client_cert: Some("cert"),
            ssl_client: Some("1"),
            ssl_client_verify: Some("0"),
            issuer_dn_b64: Some(issuer),
            subject_dn_b64: Some(subject),
            root_ca_dn_b64: Some(root),
        }
    }

    #[test]
    fn canonicalization_ignores_order_and_case() {
        let a = canonicalize_dn("CN=example.com, O=Acme, OU=Eng");
        let b = canonicalize_dn("ou=eng/o=ACME/cn=Example.COM");
        assert_eq!(a, b);
    }

    #[test]
    fn accepts_trusted_pair_and_root() {
        let issuer = encode("CN=Intermediate CA, O=Acme");
        let subject = encode("CN=client.acme.com, O=Acme");
        let root = encode("CN=Acme Root CA");

        let auth = MtlsAuthenticator::new(
            vec![TrustedPair {
                issuer: "CN=Intermediate CA, O=Acme".into(),
                subject: "CN=client.acme.com, O=Acme".into(),
            }],
            vec!["CN=Acme Root CA".into()],
        );

        assert!(auth.verify(headers(&issuer, &subject, &root)).is_ok());
    }

    #[test]
    fn rejects_when_proxy_verification_headers_absent() {
        let auth = MtlsAuthenticator::new(vec![], vec![]);
        let mut h = headers("", "", "");
        h.ssl_client_verify = Some("1");
        assert!(matches!(auth.verify(h), Err(AuthError::MissingCertificate)));
    }

    #[test]
    fn rejects_untrusted_subject() {
        let issuer = encode("CN=Intermediate CA");
        let subject = encode("CN=attacker.example.com");
        let root = encode("CN=Acme Root CA");
        let auth = MtlsAuthenticator::new(vec![], vec!["CN=Acme Root CA".into()]);
        assert!(matches!(
            auth.verify(headers(&issuer, &subject, &root)),
            Err(AuthError::UntrustedSubject(_))
        ));
    }
}
