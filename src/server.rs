// HTTP surface: POST /get_formats, POST /download, GET /health

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::config::ConfigError;
use crate::downloader::{
    DownloadError, DownloadRequest, FormatDescriptor, FormatLister, FormatsRequest, MediaTool,
    StreamDownloader,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(std::io::Error),
}

/// Shared by all handlers; holds no per-request state.
#[derive(Clone)]
pub struct AppState {
    pub formats: Arc<FormatLister>,
    pub downloads: Arc<StreamDownloader>,
}

impl AppState {
    pub fn new(tool: Arc<dyn MediaTool>, manifest_timeout: Duration, chunk_size: usize) -> Self {
        Self {
            formats: Arc::new(FormatLister::new(tool.clone(), manifest_timeout)),
            downloads: Arc::new(StreamDownloader::new(tool, chunk_size)),
        }
    }
}

#[derive(Debug, Serialize)]
struct FormatsResponse {
    success: bool,
    title: String,
    formats: Vec<FormatDescriptor>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        let status = match &self {
            DownloadError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DownloadError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            DownloadError::Internal(msg) => error!("Unexpected error: {}", msg),
            e if !e.is_client_error() => warn!("Request failed: {}", e),
            _ => debug!("Rejected request: {}", self),
        }

        let body = Json(ErrorBody {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Prefix local failures so the client can tell which step broke.
fn with_context(err: DownloadError, context: &str) -> DownloadError {
    match err {
        DownloadError::Internal(msg) => DownloadError::Internal(format!("{}: {}", context, msg)),
        other => other,
    }
}

/// A body that isn't JSON is handled like one with no fields.
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!("Unreadable request body: {}", rejection);
            T::default()
        }
    }
}

async fn get_formats(
    State(state): State<AppState>,
    payload: Result<Json<FormatsRequest>, JsonRejection>,
) -> Result<Json<FormatsResponse>, DownloadError> {
    let request = body_or_default(payload);

    let listing = state
        .formats
        .list_formats(request.url.as_deref())
        .await
        .map_err(|e| with_context(e, "An unexpected server error occurred"))?;

    Ok(Json(FormatsResponse {
        success: true,
        title: listing.title,
        formats: listing.formats,
    }))
}

async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, DownloadError> {
    let request = body_or_default(payload);

    let prepared = state
        .downloads
        .start(
            request.url.as_deref(),
            request.format_id.as_deref(),
            request.filename.as_deref(),
        )
        .map_err(|e| with_context(e, "Failed to start download stream"))?;

    // from_bytes: the sanitized name may still contain non-ASCII characters.
    let disposition = HeaderValue::from_bytes(prepared.content_disposition().as_bytes())
        .map_err(|e| DownloadError::Internal(format!("Failed to start download stream: {}", e)))?;

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(prepared.content_type)),
        (CONTENT_DISPOSITION, disposition),
    ];

    // Headers go out with the first chunk; from here on errors can only cut the body short.
    Ok((headers, Body::from_stream(prepared.session)).into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]);

    if allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid origin in ALLOWED_ORIGINS: {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/get_formats", post(get_formats))
        .route("/download", post(download))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{ManifestBehavior, StubTool};
    use crate::downloader::DEFAULT_CHUNK_SIZE;
    use serde_json::{json, Value};

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ";

    async fn spawn_app(tool: Arc<StubTool>, manifest_timeout: Duration) -> String {
        let state = AppState::new(tool, manifest_timeout, DEFAULT_CHUNK_SIZE);
        let app = router(state, &[]);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn manifest() -> Value {
        json!({
            "title": "Rick Astley - Never Gonna Give You Up",
            "formats": [
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                 "format_note": "medium", "abr": 129.5, "filesize_approx": 3433331},
                {"format_id": "137", "ext": "mp4", "resolution": "1920x1080", "fps": 25,
                 "vcodec": "avc1.640028", "acodec": "none"}
            ]
        })
    }

    #[tokio::test]
    async fn test_get_formats_success() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())));
        let base = spawn_app(tool.clone(), Duration::from_secs(60)).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/get_formats", base))
            .json(&json!({"url": URL}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["title"], "Rick Astley - Never Gonna Give You Up");
        assert_eq!(body["formats"][0]["id"], "140");
        assert_eq!(body["formats"][0]["resolution"], "medium");
        assert_eq!(body["formats"][0]["is_audio_only"], true);
        assert_eq!(body["formats"][1]["is_video_only"], true);
        assert_eq!(body["formats"][1]["filesize_approx"], Value::Null);
        assert_eq!(tool.manifest_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_formats_missing_url() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())));
        let base = spawn_app(tool.clone(), Duration::from_secs(60)).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/get_formats", base))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"success": false, "error": "URL is required"}));

        let resp = client
            .post(format!("{}/get_formats", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        assert_eq!(tool.manifest_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_formats_error_statuses() {
        let rejected = Arc::new(StubTool::new(ManifestBehavior::Fail(
            "ERROR: Unsupported URL: https://youtu.be/x".to_string(),
        )));
        let base = spawn_app(rejected, Duration::from_secs(60)).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/get_formats", base))
            .json(&json!({"url": URL}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Unsupported URL or video unavailable.");

        let slow = Arc::new(StubTool::new(ManifestBehavior::Hang(Duration::from_secs(61))));
        let base = spawn_app(slow, Duration::from_millis(100)).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/get_formats", base))
            .json(&json!({"url": URL}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 504);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Fetching formats timed out");
    }

    #[tokio::test]
    async fn test_download_streams_body_with_headers() {
        let tool = Arc::new(
            StubTool::new(ManifestBehavior::Json(manifest())).with_stream_script("seq 1 5000"),
        );
        let base = spawn_app(tool.clone(), Duration::from_secs(60)).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/download", base))
            .json(&json!({"url": URL, "format_id": "137+140", "filename": "Never Gonna.mp4"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"Never_Gonna.mp4\""
        );
        assert_eq!(resp.headers()["content-type"], "video/mp4");

        let body = resp.bytes().await.unwrap();
        let expected: String = (1..=5000).map(|i| format!("{}\n", i)).collect();
        assert_eq!(body.as_ref(), expected.as_bytes());
        assert_eq!(tool.stream_requests(), vec![(URL.to_string(), "137+140".to_string())]);
    }

    #[tokio::test]
    async fn test_download_without_filename_uses_placeholder() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())).with_stream_script("printf x"));
        let base = spawn_app(tool, Duration::from_secs(60)).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/download", base))
            .json(&json!({"url": URL, "format_id": "18"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"download.dat\""
        );
        assert_eq!(resp.headers()["content-type"], "application/octet-stream");
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_download_rejects_bad_input() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())).with_stream_script("printf x"));
        let base = spawn_app(tool.clone(), Duration::from_secs(60)).await;
        let client = reqwest::Client::new();

        for payload in [
            json!({"url": URL}),
            json!({"format_id": "18"}),
            json!({"url": "https://www.youtube.com/playlist?list=xyz", "format_id": "18"}),
        ] {
            let resp = client
                .post(format!("{}/download", base))
                .json(&payload)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400);
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["success"], false);
        }
        assert_eq!(tool.stream_calls(), 0);
    }

    #[tokio::test]
    async fn test_download_spawn_failure_is_structured() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())));
        let base = spawn_app(tool, Duration::from_secs(60)).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/download", base))
            .json(&json!({"url": URL, "format_id": "18"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to start download stream"));
    }

    #[tokio::test]
    async fn test_health() {
        let tool = Arc::new(StubTool::new(ManifestBehavior::Json(manifest())));
        let base = spawn_app(tool, Duration::from_secs(60)).await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_internal_context_only_touches_internal() {
        let err = with_context(DownloadError::Internal("boom".into()), "Failed to start download stream");
        assert_eq!(err.to_string(), "Failed to start download stream: boom");
        assert_eq!(with_context(DownloadError::Timeout, "x"), DownloadError::Timeout);
    }
}
