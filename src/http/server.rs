//! Router Surface (C8): wires the content source, cache, authenticator,
//! update scheduler, and webhook receiver into one `axum::Router` and
//! serves it with a graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::auth::basic::BasicAuthenticator;
use crate::auth::mtls::{MtlsAuthenticator, TrustedPair};
use crate::auth::Authenticator;
use crate::cache::DocumentCache;
use crate::config::{ProviderConfig, SourceType};
use crate::errors::ProviderError;
use crate::fetch::ContentFetcher;
use crate::observability::Logger;
use crate::snapshot::SnapshotStore;
use crate::update::{UpdateScheduler, UpdateStateManager};

use super::config::cors_layer;
use super::routes;
use super::state::{AppState, ContentRoot};
use super::webhook::WebhookReceiver;

/// Assembles the configured subsystems and serves until SIGINT/SIGTERM.
pub async fn run(config: ProviderConfig) -> Result<(), ProviderError> {
    let config = Arc::new(config);
    let authenticator = Arc::new(build_authenticator(&config));
    let cache = Arc::new(DocumentCache::new());
    let update_state = Arc::new(UpdateStateManager::new());
    let webhook = Arc::new(WebhookReceiver::new(
        config.webhook_secret.clone(),
        config
            .github
            .as_ref()
            .map(|g| g.repository.clone())
            .unwrap_or_default(),
        config.github.as_ref().map(|g| g.branch.clone()).unwrap_or_default(),
    ));

    let (content, scheduler) = match config.source_type {
        SourceType::Local => (ContentRoot::Local(config.directory.clone().into()), None),
        SourceType::Github => {
            let github = config
                .github
                .clone()
                .expect("validated config guarantees github is set for SourceType::Github");
            let snapshot = Arc::new(SnapshotStore::new(
                config.data_dir.clone(),
                config.documents_subdirectory.clone(),
            ));
            snapshot
                .cleanup_staging()
                .map_err(|e| ProviderError::InternalServerError(e.to_string()))?;

            let fetcher = Arc::new(ContentFetcher::new(github.clone()));
            let scheduler = Arc::new(UpdateScheduler::new(
                update_state.clone(),
                fetcher,
                snapshot.clone(),
                cache.clone(),
                github,
                Duration::from_secs(config.update_delay_secs),
            ));

            if snapshot.current_path().is_none() {
                scheduler.schedule_immediate_update(true).await;
            }
            scheduler.spawn_periodic_poll();

            (ContentRoot::Snapshot(snapshot), Some(scheduler))
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        authenticator,
        content,
        cache,
        update_state,
        scheduler,
        webhook,
    });

    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ProviderError::InternalServerError(format!("failed to bind {}: {}", addr, e)))?;

    Logger::info("server_listening", &[("addr", addr.as_str())]);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ProviderError::InternalServerError(e.to_string()))
}

fn build_authenticator(config: &ProviderConfig) -> Authenticator {
    if config.auth.open {
        return Authenticator::open();
    }

    let basic = config
        .auth
        .basic
        .then(|| BasicAuthenticator::new(config.basic_auth_users.clone()));

    let mtls = config.auth.cf_mtls.then(|| {
        let pairs = config
            .cf_mtls_trusted_pairs
            .iter()
            .map(|(issuer, subject)| TrustedPair {
                issuer: issuer.clone(),
                subject: subject.clone(),
            })
            .collect();
        MtlsAuthenticator::new(pairs, config.cf_mtls_trusted_roots.clone())
    });

    Authenticator::new(basic, mtls)
}

/// Builds the served `Router` from already-assembled state. Exposed so
/// integration tests can drive the app with `tower::ServiceExt::oneshot`
/// without binding a real socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/ord/v1/{first}/{*rest}", get(routes::ord_v1_nested))
        .route("/ord/v1/{file_name}", get(routes::ord_v1_file))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            routes::auth_and_readiness,
        ));

    let public = Router::new()
        .route(
            "/.well-known/open-resource-discovery",
            get(routes::well_known),
        )
        .route("/api/v1/webhook/github", post(routes::webhook))
        .route("/api/v1/status", get(routes::status))
        .route("/health", get(routes::health))
        .route("/status", get(routes::dashboard))
        .route("/", get(routes::root));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state.clone())
        .layer(cors_layer(&state.config.cors_origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    Logger::info("server_shutting_down", &[]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn local_config() -> ProviderConfig {
        ProviderConfig {
            base_url: "https://ord.example.com".into(),
            source_type: SourceType::Local,
            directory: ".".into(),
            documents_subdirectory: "documents".into(),
            auth: AuthConfig {
                open: true,
                basic: false,
                cf_mtls: false,
            },
            host: "0.0.0.0".into(),
            port: 8080,
            github: None,
            data_dir: "./data".into(),
            update_delay_secs: 30,
            status_dashboard_enabled: false,
            cors_origins: vec![],
            basic_auth_users: Default::default(),
            webhook_secret: None,
            cf_mtls_trusted_pairs: Vec::new(),
            cf_mtls_trusted_roots: Vec::new(),
        }
    }

    #[test]
    fn open_auth_builds_an_open_authenticator() {
        let auth = build_authenticator(&local_config());
        assert!(auth.is_open());
    }

    #[tokio::test]
    async fn router_builds_for_a_local_source() {
        let state = Arc::new(AppState {
            config: Arc::new(local_config()),
            authenticator: Arc::new(Authenticator::open()),
            content: ContentRoot::Local(".".into()),
            cache: Arc::new(DocumentCache::new()),
            update_state: Arc::new(UpdateStateManager::new()),
            scheduler: None,
            webhook: Arc::new(WebhookReceiver::new(None, String::new(), String::new())),
        });
        let _router = build_router(state);
    }
}
