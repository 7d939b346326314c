//! End-to-end coverage of the Router Surface, driven through
//! `tower::ServiceExt::oneshot` against a real `axum::Router` over a
//! temporary local content directory — no socket is bound.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use ord_provider_server::auth::basic::BasicAuthenticator;
use ord_provider_server::auth::mtls::{MtlsAuthenticator, TrustedPair};
use ord_provider_server::auth::Authenticator;
use ord_provider_server::cache::DocumentCache;
use ord_provider_server::config::{AuthConfig, ProviderConfig, SourceType};
use ord_provider_server::http::state::{AppState, ContentRoot};
use ord_provider_server::http::webhook::WebhookReceiver;
use ord_provider_server::http::{self};
use ord_provider_server::update::UpdateStateManager;

fn write_ref_app(dir: &std::path::Path) {
    let docs = dir.join("documents");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(
        docs.join("ref-app-example-1.json"),
        r#"{
            "openResourceDiscovery": "1.6",
            "perspective": "system-instance",
            "apiResources": []
        }"#,
    )
    .unwrap();
}

fn base_config() -> ProviderConfig {
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
        host: "127.0.0.1".into(),
        port: 8081,
        github: None,
        data_dir: "./data".into(),
        update_delay_secs: 30,
        status_dashboard_enabled: true,
        cors_origins: vec![],
        basic_auth_users: HashMap::new(),
        webhook_secret: None,
        cf_mtls_trusted_pairs: Vec::new(),
        cf_mtls_trusted_roots: Vec::new(),
    }
}

fn app_with(
    dir: &std::path::Path,
    authenticator: Authenticator,
    config_overrides: impl FnOnce(&mut ProviderConfig),
) -> axum::Router {
    let mut config = base_config();
    config.directory = dir.to_string_lossy().into_owned();
    config_overrides(&mut config);

    let state = Arc::new(AppState {
        config: Arc::new(config),
        authenticator: Arc::new(authenticator),
        content: ContentRoot::Local(dir.to_path_buf()),
        cache: Arc::new(DocumentCache::new()),
        update_state: Arc::new(UpdateStateManager::new()),
        scheduler: None,
        webhook: Arc::new(WebhookReceiver::new(None, "owner/repo".into(), "main".into())),
    });

    http::build_router(state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_auth(uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", authorization)
        .body(Body::empty())
        .unwrap()
}

// S1 — local happy path.
#[tokio::test]
async fn well_known_lists_the_published_document() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (status, body) = send(&app, get("/.well-known/open-resource-discovery")).await;
    assert_eq!(status, StatusCode::OK);
    let documents = body["openResourceDiscoveryV1"]["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
}

#[tokio::test]
async fn basic_auth_document_fetch_succeeds_with_correct_credentials() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let hash = bcrypt::hash("secret", bcrypt::DEFAULT_COST).unwrap();
    let users = HashMap::from([("admin".to_string(), hash)]);
    let auth = Authenticator::new(Some(BasicAuthenticator::new(users)), None);
    let app = app_with(dir.path(), auth, |c| c.auth = AuthConfig { open: false, basic: true, cf_mtls: false });

    let (status, body) = send(
        &app,
        get_with_auth("/ord/v1/documents/ref-app-example-1", "Basic YWRtaW46c2VjcmV0"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["openResourceDiscovery"], "1.6");
}

// S2 — auth failure.
#[tokio::test]
async fn document_fetch_without_credentials_is_unauthorized() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let hash = bcrypt::hash("secret", bcrypt::DEFAULT_COST).unwrap();
    let users = HashMap::from([("admin".to_string(), hash)]);
    let auth = Authenticator::new(Some(BasicAuthenticator::new(users)), None);
    let app = app_with(dir.path(), auth, |c| c.auth = AuthConfig { open: false, basic: true, cf_mtls: false });

    let (status, body) = send(&app, get("/ord/v1/documents/ref-app-example-1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn document_fetch_with_wrong_password_is_unauthorized() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let hash = bcrypt::hash("secret", bcrypt::DEFAULT_COST).unwrap();
    let users = HashMap::from([("admin".to_string(), hash)]);
    let auth = Authenticator::new(Some(BasicAuthenticator::new(users)), None);
    let app = app_with(dir.path(), auth, |c| c.auth = AuthConfig { open: false, basic: true, cf_mtls: false });

    // admin:wrong
    let (status, _) = send(
        &app,
        get_with_auth("/ord/v1/documents/ref-app-example-1", "Basic YWRtaW46d3Jvbmc="),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// S3 — path traversal.
#[tokio::test]
async fn path_traversal_is_rejected_as_not_found() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (status, _) = send(&app, get("/ord/v1/documents/../../etc/passwd")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// S4 — ETag stability.
#[tokio::test]
async fn etag_is_identical_across_repeated_requests() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let first = app
        .clone()
        .oneshot(get("/ord/v1/documents/ref-app-example-1"))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(get("/ord/v1/documents/ref-app-example-1"))
        .await
        .unwrap();

    let first_etag = first.headers().get("etag").cloned();
    let second_etag = second.headers().get("etag").cloned();
    assert!(first_etag.is_some());
    assert_eq!(first_etag, second_etag);
}

// S8 — perspective filter.
#[tokio::test]
async fn perspective_query_filters_the_document_list() {
    let dir = tempfile::TempDir::new().unwrap();
    let docs = dir.path().join("documents");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(
        docs.join("a.json"),
        r#"{"openResourceDiscovery":"1.6","perspective":"system-version"}"#,
    )
    .unwrap();
    std::fs::write(
        docs.join("b.json"),
        r#"{"openResourceDiscovery":"1.6","perspective":"system-instance"}"#,
    )
    .unwrap();
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (status, body) = send(
        &app,
        get("/.well-known/open-resource-discovery?perspective=system-version"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let documents = body["openResourceDiscoveryV1"]["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert!(documents[0]["url"].as_str().unwrap().ends_with("/a"));
}

// Property 5 — a perspective-less document defaults to system-instance and
// is included under that filter.
#[tokio::test]
async fn document_without_perspective_defaults_to_system_instance() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let docs = dir.path().join("documents");
    std::fs::write(
        docs.join("no-perspective.json"),
        r#"{"openResourceDiscovery":"1.6"}"#,
    )
    .unwrap();
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (_, body) = send(
        &app,
        get("/.well-known/open-resource-discovery?perspective=system-instance"),
    )
    .await;
    let documents = body["openResourceDiscoveryV1"]["documents"].as_array().unwrap();
    assert!(documents
        .iter()
        .any(|d| d["url"].as_str().unwrap().ends_with("/no-perspective")));
}

// Property 4 — the URL the well-known document advertises for a resource
// definition actually resolves, at the sibling directory the raw document
// names, not under the documents subdirectory.
#[tokio::test]
async fn resource_definition_url_round_trips_to_its_sibling_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let docs = dir.path().join("documents");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(
        docs.join("ref-app-example-1.json"),
        r#"{
            "openResourceDiscovery": "1.6",
            "apiResources": [{
                "ordId": "urn:apiResource:example:v1",
                "resourceDefinitions": [
                    { "url": "/urn_apiResource_example_v1/openapi.json" }
                ]
            }]
        }"#,
    )
    .unwrap();
    let resource_dir = dir.path().join("urn_apiResource_example_v1");
    std::fs::create_dir_all(&resource_dir).unwrap();
    std::fs::write(resource_dir.join("openapi.json"), r#"{"openapi":"3.0.0"}"#).unwrap();

    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (_, doc) = send(&app, get("/ord/v1/documents/ref-app-example-1")).await;
    let advertised = doc["apiResources"][0]["resourceDefinitions"][0]["url"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(advertised, "/ord/v1/urn:apiResource:example:v1/openapi.json");

    let response = app.oneshot(get(&advertised)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let resolved: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resolved["openapi"], "3.0.0");
}

// Property 7 — auth OR-composition.
#[tokio::test]
async fn basic_credentials_satisfy_an_or_composed_authenticator() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let hash = bcrypt::hash("secret", bcrypt::DEFAULT_COST).unwrap();
    let users = HashMap::from([("admin".to_string(), hash)]);
    let auth = Authenticator::new(
        Some(BasicAuthenticator::new(users)),
        Some(MtlsAuthenticator::new(
            vec![TrustedPair {
                issuer: "CN=Intermediate CA".into(),
                subject: "CN=someone-else".into(),
            }],
            vec!["CN=Root".into()],
        )),
    );
    let app = app_with(dir.path(), auth, |c| c.auth = AuthConfig { open: false, basic: true, cf_mtls: true });

    let (status, _) = send(
        &app,
        get_with_auth("/ord/v1/documents/ref-app-example-1", "Basic YWRtaW46c2VjcmV0"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/ord/v1/documents/ref-app-example-1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// S6 — webhook rejection.
fn scheduler_app(dir: &std::path::Path) -> axum::Router {
    use ord_provider_server::cache::DocumentCache;
    use ord_provider_server::config::GithubConfig;
    use ord_provider_server::fetch::ContentFetcher;
    use ord_provider_server::snapshot::SnapshotStore;
    use ord_provider_server::update::UpdateScheduler;

    let github = GithubConfig {
        api_url: "https://api.github.com".into(),
        repository: "owner/repo".into(),
        branch: "main".into(),
        token: "token".into(),
    };
    let mut config = base_config();
    config.source_type = SourceType::Github;
    config.github = Some(github.clone());
    config.data_dir = dir.to_string_lossy().into_owned();

    let snapshot = Arc::new(SnapshotStore::new(dir, "documents"));
    let fetcher = Arc::new(ContentFetcher::new(github.clone()));
    let update_state = Arc::new(UpdateStateManager::new());
    let cache = Arc::new(DocumentCache::new());
    let scheduler = Arc::new(UpdateScheduler::new(
        update_state.clone(),
        fetcher,
        snapshot.clone(),
        cache.clone(),
        github,
        std::time::Duration::from_secs(30),
    ));

    let state = Arc::new(AppState {
        config: Arc::new(config),
        authenticator: Arc::new(Authenticator::open()),
        content: ContentRoot::Snapshot(snapshot),
        cache,
        update_state,
        scheduler: Some(scheduler),
        webhook: Arc::new(WebhookReceiver::new(None, "owner/repo".into(), "main".into())),
    });

    http::build_router(state)
}

fn post_json(uri: &str, headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn webhook_rejects_a_push_from_a_different_repository() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = scheduler_app(dir.path());

    let body = r#"{"ref":"refs/heads/main","repository":{"full_name":"different/repo"}}"#;
    let request = post_json(
        "/api/v1/webhook/github",
        &[("x-github-event", "push")],
        body,
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "different repository");
}

#[tokio::test]
async fn webhook_rejects_a_push_to_a_different_branch() {
    let dir = tempfile::TempDir::new().unwrap();
    let app = scheduler_app(dir.path());

    let body = r#"{"ref":"refs/heads/develop","repository":{"full_name":"owner/repo"}}"#;
    let request = post_json(
        "/api/v1/webhook/github",
        &[("x-github-event", "push")],
        body,
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "different branch");
}

#[tokio::test]
async fn webhook_without_a_scheduler_is_a_validation_error() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let request = post_json("/api/v1/webhook/github", &[], "{}");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_ok_and_published_content() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sync"]["has_content"], true);
}

#[tokio::test]
async fn root_redirects_to_the_status_dashboard_when_enabled() {
    let dir = tempfile::TempDir::new().unwrap();
    write_ref_app(dir.path());
    let app = app_with(dir.path(), Authenticator::open(), |_| {});

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get("location").unwrap(), "/status");
}
