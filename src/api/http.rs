//! HTTP API Server
//!
//! Health check plus the three note endpoints. Everything except `/health`
//! requires the bearer token when one is configured.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Json, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::auth::authorize;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::storage::NoteStore;

/// Shared application state
pub struct AppState {
    /// Note storage backend
    pub store: Arc<dyn NoteStore>,
    /// Bearer token for authenticated endpoints
    pub token: Option<String>,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, store: Arc<dyn NoteStore>) -> Self {
        let token = config.token.clone().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!("No BACKEND_TOKEN configured, note endpoints are unauthenticated");
        }

        let state = Arc::new(AppState { store, token });
        Self { config, state }
    }

    /// Get the state for sharing with other components
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Create the router
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(handle_health))
            .route("/listNotes", get(handle_list_notes))
            .route("/readNote", post(handle_read_note))
            .route("/writeNote", post(handle_write_note))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        tracing::info!("HTTP API listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        tracing::info!("HTTP API stopped");
        Ok(())
    }
}

// ============ Request/Response Types ============

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub bucket: String,
    pub endpoint: String,
}

/// Query string accepted by `/listNotes`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub prefix: Option<String>,
}

/// List response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListNotesResponse {
    pub files: Vec<String>,
}

/// Read request, as sent by clients
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReadNoteRequest {
    #[serde(default)]
    pub filename: Option<String>,
}

/// Read response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadNoteResponse {
    pub filename: String,
    pub content: String,
}

/// Write request, as sent by clients
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteNoteRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Write response
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteNoteResponse {
    pub success: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============ Handlers ============

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let info = state.store.describe();
    Json(HealthResponse {
        ok: true,
        bucket: info.bucket,
        endpoint: info.endpoint,
    })
}

async fn handle_list_notes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    if !authorize(&headers, state.token.as_deref()) {
        return unauthorized("/listNotes");
    }

    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    match state.store.list(query.prefix.as_deref()).await {
        Ok(notes) => Json(ListNotesResponse {
            files: notes.into_iter().map(|n| n.key).collect(),
        })
        .into_response(),
        Err(e) => store_error(e),
    }
}

async fn handle_read_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    if !authorize(&headers, state.token.as_deref()) {
        return unauthorized("/readNote");
    }

    let body = match json_object(payload) {
        Ok(b) => b,
        Err(response) => return response,
    };

    let filename = match required_filename(&body) {
        Ok(f) => f,
        Err(response) => return response,
    };

    match state.store.read(&filename).await {
        Ok(content) => Json(ReadNoteResponse { filename, content }).into_response(),
        Err(e) => store_error(e),
    }
}

async fn handle_write_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    if !authorize(&headers, state.token.as_deref()) {
        return unauthorized("/writeNote");
    }

    let body = match json_object(payload) {
        Ok(b) => b,
        Err(response) => return response,
    };

    let filename = match required_filename(&body) {
        Ok(f) => f,
        Err(response) => return response,
    };
    let content = match optional_string(&body, "content") {
        Ok(c) => c.unwrap_or_default(),
        Err(response) => return response,
    };

    match state.store.write(&filename, &content).await {
        Ok(()) => {
            tracing::info!("Stored note {} ({} bytes)", filename, content.len());
            Json(WriteNoteResponse {
                success: true,
                message: format!("{} uploaded", filename),
            })
            .into_response()
        }
        Err(e) => store_error(e),
    }
}

// ============ Helpers ============

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Unwrap a JSON body that must be an object.
///
/// Malformed or wrongly shaped JSON is a 400; other rejections (missing
/// content type, body too large) keep their own status.
fn json_object(
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> std::result::Result<serde_json::Map<String, serde_json::Value>, Response> {
    match payload {
        Ok(Json(serde_json::Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "Request body must be a JSON object",
        )),
        Err(rejection @ (JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_))) => {
            Err(error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
        }
        Err(rejection) => Err(error_response(rejection.status(), rejection.body_text())),
    }
}

/// String field that may be absent or null
fn optional_string(
    body: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> std::result::Result<Option<String>, Response> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("{} must be a string", field),
        )),
    }
}

fn required_filename(
    body: &serde_json::Map<String, serde_json::Value>,
) -> std::result::Result<String, Response> {
    match optional_string(body, "filename")? {
        Some(f) if !f.is_empty() => Ok(f),
        _ => Err(error_response(StatusCode::BAD_REQUEST, "Missing filename")),
    }
}

fn unauthorized(endpoint: &str) -> Response {
    tracing::warn!("Rejected unauthenticated request to {}", endpoint);
    error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
}

fn store_error(e: Error) -> Response {
    match e {
        Error::NoteNotFound(_) => error_response(StatusCode::NOT_FOUND, "Not found"),
        e if e.is_client_error() => error_response(e.status_code(), e.to_string()),
        e => {
            tracing::error!("Storage operation failed: {}", e);
            error_response(e.status_code(), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryNoteStore, NoteSummary, StoreInfo};
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    fn server_with(store: Arc<dyn NoteStore>, token: Option<&str>) -> HttpServer {
        let config = ApiConfig {
            token: token.map(str::to_string),
            ..ApiConfig::default()
        };
        HttpServer::new(config, store)
    }

    fn app() -> Router {
        server_with(Arc::new(MemoryNoteStore::new()), Some(TOKEN)).router()
    }

    fn post_json(uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_needs_no_credentials() {
        let app = app();
        let (status, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["bucket"], "memory");
    }

    #[tokio::test]
    async fn test_authenticated_endpoints_reject_missing_token() {
        let app = app();

        let (status, body) = send(&app, get("/listNotes", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = send(&app, post_json("/readNote", serde_json::json!({"filename": "a"}), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": "a", "content": "x"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let app = app();
        let (status, _) = send(&app, get("/listNotes", Some("not-the-token"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_checked_before_body() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/writeNote")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json(
                "/writeNote",
                serde_json::json!({"filename": "journal/day1.md", "content": "# Day 1\nhello"}),
                Some(TOKEN),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "journal/day1.md uploaded");

        let (status, body) = send(
            &app,
            post_json("/readNote", serde_json::json!({"filename": "journal/day1.md"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "journal/day1.md");
        assert_eq!(body["content"], "# Day 1\nhello");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let app = app();
        for content in ["first", "second"] {
            let (status, _) = send(
                &app,
                post_json("/writeNote", serde_json::json!({"filename": "a", "content": content}), Some(TOKEN)),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = send(&app, post_json("/readNote", serde_json::json!({"filename": "a"}), Some(TOKEN))).await;
        assert_eq!(body["content"], "second");
    }

    #[tokio::test]
    async fn test_list_reflects_writes() {
        let app = app();
        let (_, body) = send(&app, get("/listNotes", Some(TOKEN))).await;
        assert_eq!(body["files"], serde_json::json!([]));

        for name in ["b.txt", "a.txt", "dir/c.txt"] {
            send(
                &app,
                post_json("/writeNote", serde_json::json!({"filename": name, "content": name}), Some(TOKEN)),
            )
            .await;
        }

        let (status, body) = send(&app, get("/listNotes", Some(TOKEN))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"], serde_json::json!(["a.txt", "b.txt", "dir/c.txt"]));

        let (_, body) = send(&app, get("/listNotes?prefix=dir%2F", Some(TOKEN))).await;
        assert_eq!(body["files"], serde_json::json!(["dir/c.txt"]));
    }

    #[tokio::test]
    async fn test_write_without_content_stores_empty_note() {
        let app = app();
        let (status, _) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": "empty"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, post_json("/readNote", serde_json::json!({"filename": "empty"}), Some(TOKEN))).await;
        assert_eq!(body["content"], "");
    }

    #[tokio::test]
    async fn test_read_missing_note() {
        let app = app();
        let (status, body) = send(
            &app,
            post_json("/readNote", serde_json::json!({"filename": "ghost"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_missing_filename() {
        let app = app();
        for body in [
            serde_json::json!({}),
            serde_json::json!({"filename": ""}),
            serde_json::json!({"filename": null}),
        ] {
            let (status, resp) = send(&app, post_json("/readNote", body.clone(), Some(TOKEN))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp["error"], "Missing filename");

            let (status, _) = send(&app, post_json("/writeNote", body, Some(TOKEN))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_oversized_filename() {
        let app = app();
        let long = "x".repeat(crate::storage::MAX_KEY_BYTES + 1);
        let (status, body) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": long, "content": "x"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid filename"));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/readNote")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::from("{\"filename\": "))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_no_token_configured_allows_all() {
        let app = server_with(Arc::new(MemoryNoteStore::new()), None).router();
        let (status, _) = send(&app, get("/listNotes", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_array_body_rejected() {
        let store = Arc::new(MemoryNoteStore::new());
        let app = server_with(store.clone(), Some(TOKEN)).router();

        let (status, body) = send(
            &app,
            post_json("/writeNote", serde_json::json!(["pos.txt", "positional"]), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Request body must be a JSON object");
        assert!(store.is_empty().await);

        let (status, _) = send(&app, post_json("/readNote", serde_json::json!(["pos.txt"]), Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, post_json("/readNote", serde_json::json!("pos.txt"), Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_field_types() {
        let store = Arc::new(MemoryNoteStore::new());
        let app = server_with(store.clone(), Some(TOKEN)).router();

        let (status, body) = send(&app, post_json("/readNote", serde_json::json!({"filename": 5}), Some(TOKEN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "filename must be a string");

        let (status, body) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": "a", "content": 7}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "content must be a string");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/readNote")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .body(Body::from(r#"{"filename": "a"}"#))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = ApiConfig {
            token: Some(TOKEN.into()),
            max_body_bytes: 64,
            ..ApiConfig::default()
        };
        let store = Arc::new(MemoryNoteStore::new());
        let app = HttpServer::new(config, store.clone()).router();

        let (status, body) = send(
            &app,
            post_json(
                "/writeNote",
                serde_json::json!({"filename": "big", "content": "x".repeat(256)}),
                Some(TOKEN),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
        assert!(store.is_empty().await);

        let (status, _) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": "small", "content": "x"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let request = || {
            Request::builder()
                .method("GET")
                .uri("/health")
                .header(header::ORIGIN, "https://notes.example")
                .body(Body::empty())
                .unwrap()
        };

        let config = ApiConfig {
            cors_enabled: true,
            ..ApiConfig::default()
        };
        let app = HttpServer::new(config, Arc::new(MemoryNoteStore::new())).router();
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let app = server_with(Arc::new(MemoryNoteStore::new()), None).router();
        let response = app.oneshot(request()).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl NoteStore for FailingStore {
        async fn list(&self, _prefix: Option<&str>) -> Result<Vec<NoteSummary>> {
            Err(Error::Storage("gateway unreachable".into()))
        }

        async fn read(&self, _key: &str) -> Result<String> {
            Err(Error::Storage("gateway unreachable".into()))
        }

        async fn write(&self, _key: &str, _content: &str) -> Result<()> {
            Err(Error::Storage("gateway unreachable".into()))
        }

        fn describe(&self) -> StoreInfo {
            StoreInfo {
                backend: "failing".into(),
                bucket: "b".into(),
                endpoint: "https://unreachable.invalid".into(),
            }
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let app = server_with(Arc::new(FailingStore), Some(TOKEN)).router();

        let (status, body) = send(&app, get("/listNotes", Some(TOKEN))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("gateway unreachable"));

        let (status, _) = send(
            &app,
            post_json("/writeNote", serde_json::json!({"filename": "a", "content": "x"}), Some(TOKEN)),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        // health does not touch storage
        let (status, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoint"], "https://unreachable.invalid");
    }
}
