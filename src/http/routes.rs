//! Route handlers for the Router Surface (C8).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::mtls::MtlsHeaders;
use crate::auth::AuthHeaders;
use crate::cache::CacheError;
use crate::errors::ProviderError;
use crate::processor::{self, ProcessingContext};
use crate::snapshot::SnapshotMetadata;
use crate::update::UpdateState;

use super::state::{AppState, ContentRoot, SERVER_VERSION};
use super::webhook::{WebhookError, WebhookHeaders};

const READINESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticates the request and, for a `github` source, blocks until any
/// in-flight swap finishes before letting the request reach its handler.
/// Applied only to the `/ord/v1/*` router — the well-known, status, health,
/// and webhook endpoints are reachable without it.
pub async fn auth_and_readiness(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ProviderError> {
    authenticate(&state, &headers)?;

    if state.content.is_remote() {
        state
            .update_state
            .wait_for_ready(READINESS_TIMEOUT)
            .await
            .map_err(|_| ProviderError::TimeoutError("update in progress".into()))?;
    }

    Ok(next.run(request).await)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(), ProviderError> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let mtls = MtlsHeaders {
        forwarded_client_cert: header_str("x-forwarded-client-cert"),
        ssl_client: header_str("x-ssl-client"),
        ssl_client_verify: header_str("x-ssl-client-verify"),
        issuer_dn_b64: header_str("x-ssl-client-issuer-dn"),
        subject_dn_b64: header_str("x-ssl-client-subject-dn"),
        root_ca_dn_b64: header_str("x-ssl-client-root-ca-dn"),
    };

    state
        .authenticator
        .authenticate(AuthHeaders {
            authorization: header_str("authorization"),
            mtls,
        })
        .map_err(ProviderError::from)
}

#[derive(Debug, Deserialize)]
pub struct WellKnownQuery {
    pub perspective: Option<String>,
}

/// `GET /.well-known/open-resource-discovery`
pub async fn well_known(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WellKnownQuery>,
) -> Result<Response, ProviderError> {
    let hash = no_content_yet(state.content.current_hash())?;

    if params.perspective.is_none() {
        if let Some(config) = state.cache.get_config(&hash).await {
            return Ok(json_with_headers(&config));
        }
    }

    let repo = no_content_yet(state.repository())?;
    let documents = repo
        .load_documents(&state.config.documents_subdirectory)
        .map_err(|e| ProviderError::InternalServerError(e.to_string()))?;

    let config = processor::build_config(
        &documents,
        &state.config.auth,
        &state.config.documents_subdirectory,
        params.perspective.as_deref(),
    );

    if params.perspective.is_none() {
        state.cache.set_config(&hash, config.clone()).await;
    }

    Ok(json_with_headers(&config))
}

/// `GET /ord/v1/{first}/{*rest}` — `first` is either the configured
/// documents sub-directory (serve a processed document) or an ORD id
/// (serve a resource definition file resolved through the FQN map).
pub async fn ord_v1_nested(
    State(state): State<Arc<AppState>>,
    Path((first, rest)): Path<(String, String)>,
) -> Result<Response, ProviderError> {
    if first == state.config.documents_subdirectory {
        serve_document(&state, &rest).await
    } else {
        serve_resource_by_ord_id(&state, &first, &rest).await
    }
}

async fn serve_document(state: &Arc<AppState>, raw_name: &str) -> Result<Response, ProviderError> {
    let hash = no_content_yet(state.content.current_hash())?;
    let stem = raw_name.trim_end_matches(".json");
    let relative_path = format!("{}/{}.json", state.config.documents_subdirectory, stem);

    let repo = no_content_yet(state.repository())?;
    let config = state.config.clone();
    let build_path = relative_path.clone();
    let doc = state
        .cache
        .get_or_insert_document(&hash, &relative_path, || async move {
            let raw = repo
                .read_document(&build_path)
                .map_err(|_| CacheError::NotFound(build_path.clone()))?;
            let ctx = ProcessingContext {
                base_url: &config.base_url,
                auth_methods: &config.auth,
                documents_sub_directory: &config.documents_subdirectory,
            };
            Ok(processor::process(raw, &ctx))
        })
        .await?;

    Ok(json_with_headers(&doc))
}

/// `GET /ord/v1/{fileName}`
pub async fn ord_v1_file(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<Response, ProviderError> {
    let repo = no_content_yet(state.repository())?;

    if file_name.ends_with(".json") {
        let value = repo
            .read_document(&file_name)
            .map_err(|_| ProviderError::NotFound(file_name.clone()))?;
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| ProviderError::InternalServerError(e.to_string()))?;
        Ok(bytes_with_headers("application/json", bytes))
    } else {
        let bytes = repo
            .read_file(&file_name)
            .map_err(|_| ProviderError::NotFound(file_name.clone()))?;
        Ok(bytes_with_headers(content_type_for(&file_name), bytes))
    }
}

async fn serve_resource_by_ord_id(
    state: &Arc<AppState>,
    ord_id: &str,
    rest: &str,
) -> Result<Response, ProviderError> {
    let hash = no_content_yet(state.content.current_hash())?;

    let fqn_map = match state.cache.get_fqn_map(&hash).await {
        Some(map) => map,
        None => {
            let repo = no_content_yet(state.repository())?;
            let documents = repo
                .load_documents(&state.config.documents_subdirectory)
                .map_err(|e| ProviderError::InternalServerError(e.to_string()))?;
            let map = processor::build_fqn_map(&documents);
            state.cache.set_fqn_map(&hash, map.clone()).await;
            map
        }
    };

    let entries = fqn_map.get(ord_id).ok_or_else(|| {
        ProviderError::NotFound(format!("unknown ORD id '{}'", ord_id))
    })?;

    // The directory a resource definition's file lives under, taken from
    // the document itself rather than re-derived from `ord_id` — the raw
    // `url` is the only source of truth for where the file actually is.
    let resource_dir = entries
        .iter()
        .map(|(_, path)| path.as_str())
        .find(|path| !path.is_empty())
        .and_then(|path| path.rsplit_once('/'))
        .map(|(dir, _)| dir)
        .ok_or_else(|| ProviderError::NotFound(format!("'{}' has no resource files", ord_id)))?;

    let repo = no_content_yet(state.repository())?;
    let relative_path = format!("{}/{}", resource_dir, rest);
    let bytes = repo
        .read_file(&relative_path)
        .map_err(|_| ProviderError::NotFound(relative_path.clone()))?;
    Ok(bytes_with_headers(content_type_for(rest), bytes))
}

/// `POST /api/v1/webhook/github`
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProviderError> {
    let scheduler = state.scheduler.as_ref().ok_or_else(|| {
        ProviderError::ValidationError("webhooks require a github source".into())
    })?;

    let webhook_headers = WebhookHeaders {
        manual_trigger: headers.get("x-manual-trigger").and_then(|v| v.to_str().ok()),
        signature_256: headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok()),
        github_event: headers.get("x-github-event").and_then(|v| v.to_str().ok()),
    };

    match state.webhook.handle(scheduler, webhook_headers, &body).await {
        Ok(()) => Ok(StatusCode::OK.into_response()),
        Err(WebhookError::DifferentRepository) => Ok(ignored("different repository")),
        Err(WebhookError::DifferentBranch) => Ok(ignored("different branch")),
        Err(err) => Err(ProviderError::from(err)),
    }
}

/// A rejected-but-understood push: `400` with `{status:"ignored", reason}`,
/// distinct from the generic error envelope other failures return.
fn ignored(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "status": "ignored", "reason": reason })),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct CacheStatus {
    current_hash: Option<String>,
    warming: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    update: UpdateState,
    snapshot: Option<SnapshotMetadata>,
    cache: CacheStatus,
}

/// `GET /api/v1/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let update = state.update_state.get_state().await;
    let snapshot = match &state.content {
        ContentRoot::Snapshot(store) => store.metadata().ok().flatten(),
        ContentRoot::Local(_) => None,
    };
    let cache = CacheStatus {
        current_hash: state.cache.current_hash().await,
        warming: state.cache.is_warming().await,
    };
    Json(StatusResponse {
        update,
        snapshot,
        cache,
    })
}

#[derive(Debug, Serialize)]
struct SyncInfo {
    has_content: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sync: SyncInfo,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: SERVER_VERSION,
        sync: SyncInfo {
            has_content: state.content.current_path().is_some(),
        },
    })
}

/// `GET /`
pub async fn root(State(state): State<Arc<AppState>>) -> Redirect {
    if state.config.status_dashboard_enabled {
        Redirect::to("/status")
    } else {
        Redirect::to("/.well-known/open-resource-discovery")
    }
}

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>ord-provider-server status</title></head>
<body>
<h1>ord-provider-server</h1>
<pre id="status">loading...</pre>
<script>
fetch("/api/v1/status").then(r => r.json()).then(s => {
  document.getElementById("status").textContent = JSON.stringify(s, null, 2);
});
</script>
</body>
</html>"#;

/// `GET /status` — a single self-contained page; it has no assets of its
/// own, it just polls `/api/v1/status`.
pub async fn dashboard() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], DASHBOARD_HTML)
}

fn no_content_yet<T>(value: Option<T>) -> Result<T, ProviderError> {
    value.ok_or_else(|| ProviderError::NotFound("no content published yet".into()))
}

fn json_with_headers<T: Serialize>(body: &T) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let etag = sha256_etag(&bytes);
    let mut response = (StatusCode::OK, Json(body)).into_response();
    attach_headers(&mut response, &etag);
    response
}

fn bytes_with_headers(content_type: &str, bytes: Vec<u8>) -> Response {
    let etag = sha256_etag(&bytes);
    let mut response = (StatusCode::OK, bytes).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type.parse().unwrap());
    attach_headers(&mut response, &etag);
    response
}

fn attach_headers(response: &mut Response, etag: &str) {
    let headers = response.headers_mut();
    if let Ok(value) = etag.parse() {
        headers.insert(header::ETAG, value);
    }
    headers.insert(
        "x-ord-provider-server-version",
        SERVER_VERSION.parse().unwrap(),
    );
}

fn sha256_etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("\"{}\"", hex)
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("json") => "application/json",
        Some("yaml") | Some("yml") => "application/yaml",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_guesses_common_extensions() {
        assert_eq!(content_type_for("openapi.json"), "application/json");
        assert_eq!(content_type_for("spec.yaml"), "application/yaml");
        assert_eq!(content_type_for("blob.bin"), "application/octet-stream");
    }

    #[test]
    fn etag_is_a_quoted_hex_digest() {
        let etag = sha256_etag(b"hello");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag.len(), 64 + 2);
    }
}
