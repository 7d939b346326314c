//! Command-line argument definitions.
//!
//! A single flat command (no subcommands): every flag is also readable
//! from its matching environment variable via clap's `env` feature, so
//! deployments can be configured entirely through the environment.

use clap::Parser;

/// Serves Open Resource Discovery metadata over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "ord-provider-server")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Public base URL advertised in the ORD configuration.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Content source: `local` or `github`.
    #[arg(long, env = "SOURCE_TYPE", default_value = "local")]
    pub source_type: String,

    /// Root directory: an existing path for `local`, a sub-path within the
    /// repository for `github`.
    #[arg(long, env = "DIRECTORY", default_value = ".")]
    pub directory: String,

    /// Sub-directory, relative to `directory`, where ORD documents live.
    #[arg(long, env = "DOCUMENTS_SUBDIRECTORY", default_value = "documents")]
    pub documents_subdirectory: String,

    /// Comma-separated list of auth methods: `open`, `basic`, `cf-mtls`.
    /// `open` is exclusive of the others.
    #[arg(long, env = "AUTH", default_value = "open")]
    pub auth: String,

    /// Listen host.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// GitHub API base URL (required when `source-type=github`).
    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// `owner/repo` (required when `source-type=github`).
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub github_repository: Option<String>,

    /// Branch to track (required when `source-type=github`).
    #[arg(long, env = "GITHUB_BRANCH")]
    pub github_branch: Option<String>,

    /// GitHub access token (required when `source-type=github`).
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Root directory for versioned snapshots.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Webhook coalescing cooldown, in seconds.
    #[arg(long, env = "UPDATE_DELAY", default_value_t = 30)]
    pub update_delay: u64,

    /// Serve the `/status` dashboard and static assets.
    #[arg(long, env = "STATUS_DASHBOARD_ENABLED", default_value_t = false)]
    pub status_dashboard_enabled: bool,

    /// Comma-separated list of allowed CORS origins.
    #[arg(long, env = "CORS", default_value = "")]
    pub cors: String,
}

impl Args {
    /// Parse command line arguments (and environment fallbacks).
    pub fn parse_args() -> Self {
        Args::parse()
    }
}
