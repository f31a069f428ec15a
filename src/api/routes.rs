//! HTTP routes: upload, poll, static artifacts, health.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;
use uuid::Uuid;

use super::upload::{read_upload, request_base_url};
use crate::config::ServiceConfig;
use crate::error::{Error, TaskError, UploadError};
use crate::tasks::model::TaskKind;
use crate::tasks::registry::TaskRegistry;
use crate::tasks::submitter::JobSubmitter;

/// Headroom on top of the file limit for multipart framing and form fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Settings for the HTTP surface.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Served under `/static`.
    pub static_dir: PathBuf,
    /// Fixed artifact URL prefix; derived from the request when `None`.
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl From<&ServiceConfig> for ApiConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            static_dir: config.static_dir.clone(),
            public_base_url: config.public_base_url.clone(),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub submitter: JobSubmitter,
    pub registry: Arc<TaskRegistry>,
    pub public_base_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppState {
    fn base_url(&self, headers: &HeaderMap) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| request_base_url(headers))
    }
}

/// Build the Axum router for the task API.
pub fn api_routes(submitter: JobSubmitter, registry: Arc<TaskRegistry>, config: ApiConfig) -> Router {
    let state = AppState {
        submitter,
        registry,
        public_base_url: config.public_base_url,
        max_upload_bytes: config.max_upload_bytes,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/upload/video", post(upload_video))
        .route("/api/upload/audio", post(upload_audio))
        .route("/api/task/{task_id}", get(task_status))
        .nest_service("/static", ServeDir::new(config.static_dir))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .layer(cors)
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Upload(UploadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upload(_) => StatusCode::BAD_REQUEST,
            Error::Task(TaskError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Error::Upload(e) => e.to_string(),
            Error::Task(TaskError::NotFound { .. }) => "Task not found".to_string(),
            other => {
                error!(error = %other, "Request failed");
                other.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Status ──────────────────────────────────────────────────────────────

async fn index() -> impl IntoResponse {
    Json(json!({
        "status": "online",
        "message": "Deepfake Detection API is running",
        "endpoints": {
            "upload_video": "/api/upload/video",
            "upload_audio": "/api/upload/audio",
            "task_status": "/api/task/<task_id>"
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "deepfake-tasks"
    }))
}

// ── Tasks ───────────────────────────────────────────────────────────────

async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, Error> {
    let upload = read_upload(&mut multipart, TaskKind::Video, state.max_upload_bytes).await?;
    let task_id = state
        .submitter
        .submit_video(
            &upload.filename,
            &upload.contents,
            upload.field("frames"),
            &state.base_url(&headers),
        )
        .await?;
    Ok(Json(json!({ "task_id": task_id, "status": "queued" })))
}

async fn upload_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, Error> {
    let upload = read_upload(&mut multipart, TaskKind::Audio, state.max_upload_bytes).await?;
    let task_id = state
        .submitter
        .submit_audio(&upload.filename, &upload.contents, &state.base_url(&headers))
        .await?;
    Ok(Json(json!({ "task_id": task_id, "status": "queued" })))
}

async fn task_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&task_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid task ID" })),
        )
            .into_response();
    };

    match state.registry.get(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => Error::from(e).into_response(),
    }
}
