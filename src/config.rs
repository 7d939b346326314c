//! Configuration assembly and validation.
//!
//! Mirrors the load-then-validate shape used throughout the reference CLI:
//! parsed arguments plus environment fallbacks are folded into one
//! structure, validated in a single pass, and any failure is reported as
//! JSON on stderr with a non-zero exit — never a panic.

use std::env;

use serde::{Deserialize, Serialize};

use crate::cli::Args;

/// Which content source backs the served documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Github,
}

/// Which authenticators are active, in OR-composition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub open: bool,
    pub basic: bool,
    pub cf_mtls: bool,
}

/// GitHub-specific fetch configuration, present iff `source_type == Github`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub api_url: String,
    pub repository: String,
    pub branch: String,
    pub token: String,
}

/// Fully validated, ready-to-run server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub source_type: SourceType,
    pub directory: String,
    pub documents_subdirectory: String,
    pub auth: AuthConfig,
    pub host: String,
    pub port: u16,
    pub github: Option<GithubConfig>,
    pub data_dir: String,
    pub update_delay_secs: u64,
    pub status_dashboard_enabled: bool,
    pub cors_origins: Vec<String>,
    /// user -> bcrypt hash, required iff `auth.basic`.
    #[serde(skip)]
    pub basic_auth_users: std::collections::HashMap<String, String>,
    #[serde(skip)]
    pub webhook_secret: Option<String>,
    /// Statically trusted (issuer, subject) pairs, required iff `auth.cf_mtls`.
    #[serde(skip)]
    pub cf_mtls_trusted_pairs: Vec<(String, String)>,
    /// Statically trusted root CA DNs, required iff `auth.cf_mtls`.
    #[serde(skip)]
    pub cf_mtls_trusted_roots: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TrustedPairEntry {
    issuer: String,
    subject: String,
}

/// A single configuration validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ProviderConfig {
    /// Assembles a configuration from parsed CLI args plus environment
    /// fallbacks, then validates it. Returns every violation found, not
    /// just the first, so a misconfigured deployment gets one useful error
    /// report instead of a trial-and-error loop.
    pub fn from_args(args: Args) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let base_url = args
            .base_url
            .clone()
            .or_else(default_base_url_from_vcap)
            .unwrap_or_default();
        if base_url.is_empty() {
            errors.push(ConfigError::new(
                "base_url",
                "required: pass --base-url, set BASE_URL, or provide VCAP_APPLICATION",
            ));
        } else if !is_valid_base_url(&base_url) {
            errors.push(ConfigError::new(
                "base_url",
                format!("'{}' is not a valid http(s) base URL", base_url),
            ));
        }

        let source_type = match args.source_type.as_str() {
            "local" => SourceType::Local,
            "github" => SourceType::Github,
            other => {
                errors.push(ConfigError::new(
                    "source_type",
                    format!("must be 'local' or 'github', got '{}'", other),
                ));
                SourceType::Local
            }
        };

        let github = if source_type == SourceType::Github {
            let api_url = args.github_api_url.clone();
            let repository = args.github_repository.clone();
            let branch = args.github_branch.clone();
            let token = args.github_token.clone();

            for (name, value) in [
                ("github_api_url", &api_url),
                ("github_repository", &repository),
                ("github_branch", &branch),
                ("github_token", &token),
            ] {
                if value.is_none() {
                    errors.push(ConfigError::new(
                        name,
                        "required when source-type=github",
                    ));
                }
            }

            match (api_url, repository, branch, token) {
                (Some(api_url), Some(repository), Some(branch), Some(token)) => {
                    Some(GithubConfig {
                        api_url,
                        repository,
                        branch,
                        token,
                    })
                }
                _ => None,
            }
        } else {
            None
        };

        if source_type == SourceType::Local && !std::path::Path::new(&args.directory).exists() {
            errors.push(ConfigError::new(
                "directory",
                format!("local directory '{}' does not exist", args.directory),
            ));
        }

        let auth = parse_auth(&args.auth, &mut errors);

        let basic_auth_users = if auth.basic {
            match env::var("BASIC_AUTH") {
                Ok(raw) => match serde_json::from_str::<std::collections::HashMap<String, String>>(&raw) {
                    Ok(map) if !map.is_empty() => map,
                    Ok(_) => {
                        errors.push(ConfigError::new("BASIC_AUTH", "must contain at least one user"));
                        Default::default()
                    }
                    Err(e) => {
                        errors.push(ConfigError::new(
                            "BASIC_AUTH",
                            format!("invalid JSON mapping: {}", e),
                        ));
                        Default::default()
                    }
                },
                Err(_) => {
                    errors.push(ConfigError::new(
                        "BASIC_AUTH",
                        "required (JSON mapping of user -> bcrypt hash) when auth=basic",
                    ));
                    Default::default()
                }
            }
        } else {
            Default::default()
        };

        let webhook_secret = env::var("WEBHOOK_SECRET").ok();

        let (cf_mtls_trusted_pairs, cf_mtls_trusted_roots) = if auth.cf_mtls {
            let pairs = match env::var("CF_MTLS_TRUSTED_PAIRS") {
                Ok(raw) => match serde_json::from_str::<Vec<TrustedPairEntry>>(&raw) {
                    Ok(entries) if !entries.is_empty() => {
                        entries.into_iter().map(|e| (e.issuer, e.subject)).collect()
                    }
                    Ok(_) => {
                        errors.push(ConfigError::new(
                            "CF_MTLS_TRUSTED_PAIRS",
                            "must contain at least one entry",
                        ));
                        Vec::new()
                    }
                    Err(e) => {
                        errors.push(ConfigError::new(
                            "CF_MTLS_TRUSTED_PAIRS",
                            format!("invalid JSON array: {}", e),
                        ));
                        Vec::new()
                    }
                },
                Err(_) => {
                    errors.push(ConfigError::new(
                        "CF_MTLS_TRUSTED_PAIRS",
                        "required (JSON array of {issuer, subject}) when auth=cf-mtls",
                    ));
                    Vec::new()
                }
            };
            let roots = match env::var("CF_MTLS_TRUSTED_ROOTS") {
                Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                    Ok(roots) if !roots.is_empty() => roots,
                    _ => {
                        errors.push(ConfigError::new(
                            "CF_MTLS_TRUSTED_ROOTS",
                            "must be a non-empty JSON array of root CA DNs",
                        ));
                        Vec::new()
                    }
                },
                Err(_) => {
                    errors.push(ConfigError::new(
                        "CF_MTLS_TRUSTED_ROOTS",
                        "required (JSON array of root CA DNs) when auth=cf-mtls",
                    ));
                    Vec::new()
                }
            };
            (pairs, roots)
        } else {
            (Vec::new(), Vec::new())
        };

        let cors_origins = args
            .cors
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ProviderConfig {
            base_url,
            source_type,
            directory: args.directory,
            documents_subdirectory: args.documents_subdirectory,
            auth,
            host: args.host,
            port: args.port,
            github,
            data_dir: args.data_dir,
            update_delay_secs: args.update_delay,
            status_dashboard_enabled: args.status_dashboard_enabled,
            cors_origins,
            basic_auth_users,
            webhook_secret,
            cf_mtls_trusted_pairs,
            cf_mtls_trusted_roots,
        })
    }
}

fn parse_auth(raw: &str, errors: &mut Vec<ConfigError>) -> AuthConfig {
    let methods: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let mut auth = AuthConfig::default();

    for method in &methods {
        match *method {
            "open" => auth.open = true,
            "basic" => auth.basic = true,
            "cf-mtls" => auth.cf_mtls = true,
            other => errors.push(ConfigError::new(
                "auth",
                format!("unknown auth method '{}'", other),
            )),
        }
    }

    if auth.open && methods.len() > 1 {
        errors.push(ConfigError::new("auth", "'open' is exclusive of other methods"));
    }
    if methods.is_empty() {
        auth.open = true;
    }

    auth
}

fn is_valid_base_url(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && url.len() > "https://".len()
}

/// Extracts the first `application_uris` entry from `VCAP_APPLICATION`
/// (Cloud Foundry) to default `--base-url` when neither the flag nor
/// `BASE_URL` is set.
fn default_base_url_from_vcap() -> Option<String> {
    let raw = env::var("VCAP_APPLICATION").ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let uri = parsed
        .get("application_uris")?
        .as_array()?
        .first()?
        .as_str()?;
    Some(format!("https://{}", uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            base_url: Some("https://ord.example.com".into()),
            source_type: "local".into(),
            directory: ".".into(),
            documents_subdirectory: "documents".into(),
            auth: "open".into(),
            host: "0.0.0.0".into(),
            port: 8080,
            github_api_url: None,
            github_repository: None,
            github_branch: None,
            github_token: None,
            data_dir: "./data".into(),
            update_delay: 30,
            status_dashboard_enabled: false,
            cors: "".into(),
        }
    }

    #[test]
    fn valid_local_config_parses() {
        let config = ProviderConfig::from_args(base_args()).unwrap();
        assert_eq!(config.source_type, SourceType::Local);
        assert!(config.auth.open);
    }

    #[test]
    fn missing_base_url_is_rejected() {
        let mut args = base_args();
        args.base_url = None;
        let errors = ProviderConfig::from_args(args).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "base_url"));
    }

    #[test]
    fn github_source_without_credentials_reports_all_missing_fields() {
        let mut args = base_args();
        args.source_type = "github".into();
        let errors = ProviderConfig::from_args(args).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn open_auth_combined_with_other_methods_is_rejected() {
        let mut args = base_args();
        args.auth = "open,basic".into();
        let errors = ProviderConfig::from_args(args).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "auth"));
    }

    #[test]
    fn nonexistent_local_directory_is_rejected() {
        let mut args = base_args();
        args.directory = "/no/such/path/for/ord-provider-server".into();
        let errors = ProviderConfig::from_args(args).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "directory"));
    }
}
