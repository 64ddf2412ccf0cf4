#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use hostbook_core::assistant::TextCompleter;
use hostbook_core::autosave::AutosaveConfig;
use hostbook_core::retry::RetryPolicy;
use hostbook_core::store::memory::MemoryStore;
use hostbook_events::EventBus;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use hostbook_api::auth::jwt::{issue_token, JwtConfig, OperatorRole};
use hostbook_api::config::ServerConfig;
use hostbook_api::media::LocalMediaStore;
use hostbook_api::router::build_app_router;
use hostbook_api::state::AppState;

/// A router over an in-memory store plus handles for inspecting it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub event_bus: Arc<EventBus>,
    _media_dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// A valid Bearer token for `user_id`.
    pub fn token(&self, user_id: i64) -> String {
        issue_token(user_id, OperatorRole::Owner, &self.state.config.jwt)
            .expect("token generation should succeed")
    }

    /// Rebuild the router with a question-answering collaborator.
    pub fn with_assistant(mut self, completer: Arc<dyn TextCompleter>) -> Self {
        self.state = self.state.with_assistant(completer);
        self.router = build_app_router(self.state.clone(), &self.state.config);
        self
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Debounce windows are long so only explicit flushes write during a test.
pub fn test_config(media_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: None,
            leeway_secs: 0,
            token_ttl_mins: 15,
        },
        database_url: None,
        pin_length: 6,
        autosave: AutosaveConfig {
            prose_debounce: Duration::from_secs(30),
            list_debounce: Duration::from_secs(30),
            retry: RetryPolicy {
                max_attempts: 1,
                initial_delay: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
        },
        session_idle_ttl_secs: 1800,
        media_dir: media_dir.to_path_buf(),
        media_max_dimension: 64,
    }
}

pub fn build_test_app() -> TestApp {
    let media_dir = tempfile::tempdir().expect("temp dir");
    let config = test_config(media_dir.path());
    let store = Arc::new(MemoryStore::new());
    let event_bus = Arc::new(EventBus::default());
    let media = Arc::new(LocalMediaStore::new(media_dir.path()));

    let state = AppState::new(store.clone(), config.clone(), Arc::clone(&event_bus), media)
        .expect("valid test configuration");
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        event_bus,
        _media_dir: media_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, Some(token), None)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::POST, uri, Some(token), None)).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, request(Method::POST, uri, None, Some(body))).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, request(Method::PUT, uri, Some(token), Some(body))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::DELETE, uri, Some(token), None)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// ---------------------------------------------------------------------------
// Booklet helpers
// ---------------------------------------------------------------------------

/// Create a draft as `token` and return its id.
pub async fn create_booklet(app: &TestApp, token: &str) -> String {
    let response = post_auth(app.app(), "/api/v1/booklets", token).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_str()
        .expect("booklet id")
        .to_string()
}

/// Schedule a patch and flush it, asserting both succeed.
pub async fn save(app: &TestApp, token: &str, id: &str, patch: Value) {
    let response = put_json_auth(app.app(), &format!("/api/v1/booklets/{id}/autosave"), token, patch).await;
    assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);
    let response = post_auth(app.app(), &format!("/api/v1/booklets/{id}/autosave/flush"), token).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["data"]["failed"], serde_json::json!([]));
}

/// Fill in enough content to publish, move to the last step and publish.
/// Returns the issued access code.
pub async fn publish_booklet(app: &TestApp, token: &str, id: &str) -> String {
    save(
        app,
        token,
        id,
        serde_json::json!({
            "scope": "identity",
            "value": { "property_name": "Sea View Cottage", "welcome_message": "Welcome!" }
        }),
    )
    .await;
    save(
        app,
        token,
        id,
        serde_json::json!({
            "scope": "connectivity",
            "value": { "ssid": "SeaView", "password": "s3cret-wifi" }
        }),
    )
    .await;

    let response = put_json_auth(
        app.app(),
        &format!("/api/v1/booklets/{id}/wizard/step"),
        token,
        serde_json::json!({ "step": 10 }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let response = post_auth(app.app(), &format!("/api/v1/booklets/{id}/publish"), token).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await["data"]["code"]
        .as_str()
        .expect("access code")
        .to_string()
}
