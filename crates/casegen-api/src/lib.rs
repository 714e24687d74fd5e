//! # casegen-api
//!
//! HTTP surface for casegen: upload screen recordings, queue them for
//! background analysis and fetch the generated test case.
//!
//! The router is built by [`app`] so integration tests can serve it on an
//! ephemeral port without going through `main`.

pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use casegen_core::{defaults, MediaRepository};
use casegen_pipeline::{JobQueue, VideoAnalysisPipeline};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Server settings read from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Directory uploaded recordings are written to.
    pub media_storage_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            media_storage_dir: PathBuf::from(defaults::MEDIA_STORAGE_DIR),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `HOST` (default `0.0.0.0`)
    /// - `PORT` (default 3000)
    /// - `MEDIA_STORAGE_DIR` (default `./media`)
    /// - `MAX_UPLOAD_BYTES` (default 1 GB)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(default.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
            media_storage_dir: std::env::var("MEDIA_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.media_storage_dir),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_bytes),
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn MediaRepository>,
    pub queue: JobQueue,
    pub pipeline: Arc<VideoAnalysisPipeline>,
    pub config: Arc<ApiConfig>,
}

// =============================================================================
// ROUTER
// =============================================================================

#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with middleware and state attached.
pub fn app(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::system::health_check))
        .route("/api/v1/tools", get(handlers::system::tool_report))
        .route("/api/v1/media", post(handlers::media::upload_media))
        .route("/api/v1/media/:id", get(handlers::media::get_media))
        .route("/api/v1/media/:id/analyze", post(handlers::media::analyze_media))
        .route("/api/v1/media/:id/result", get(handlers::media::get_result))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        // Multipart extraction has its own 2 MB cap; the tower layer enforces ours.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .with_state(state)
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<casegen_core::Error> for ApiError {
    fn from(err: casegen_core::Error) -> Self {
        match err {
            casegen_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            casegen_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            casegen_core::Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
