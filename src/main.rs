//! Process entry point.
//!
//! 1. Parse args (and environment fallbacks).
//! 2. Assemble and validate configuration.
//! 3. Run the server until shutdown.
//!
//! Never call subsystems directly from here; `main` only wires the pieces
//! together and translates their errors into the process exit code.

use std::process;

use ord_provider_server::cli::Args;
use ord_provider_server::config::ProviderConfig;
use ord_provider_server::http;
use ord_provider_server::observability::Logger;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    let config = match ProviderConfig::from_args(args) {
        Ok(config) => config,
        Err(errors) => {
            let error_json = serde_json::json!({
                "status": "error",
                "code": "VALIDATION_ERROR",
                "message": "configuration validation failed",
                "details": errors.iter().map(|e| serde_json::json!({
                    "field": e.field,
                    "message": e.message,
                })).collect::<Vec<_>>(),
            });
            eprintln!("{}", error_json);
            process::exit(1);
        }
    };

    if let Err(e) = http::run(config).await {
        Logger::fatal("server_crashed", &[("reason", &e.to_string())]);
        let error_json = serde_json::json!({
            "status": "error",
            "code": "INTERNAL_SERVER_ERROR",
            "message": e.to_string(),
        });
        eprintln!("{}", error_json);
        process::exit(1);
    }
}
