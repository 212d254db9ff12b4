//! HTTP routes and error mapping.

mod assist;
mod generate;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use songloom::assist::AssistError;
use songloom::client::ClientError;
use songloom::GenerationError;

use crate::state::AppState;

/// Room for the multipart envelope around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Every failure leaves the server as `{ "error": "..." }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden,
    NotFound(&'static str),
    PayloadTooLarge(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            ApiError::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(message) => ApiError::BadRequest(message),
            GenerationError::Forbidden => ApiError::Forbidden,
            GenerationError::NotFound(_) => ApiError::NotFound("Job not found"),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AssistError> for ApiError {
    fn from(err: AssistError) -> Self {
        match err {
            AssistError::Validation(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidUrl { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let mut app = Router::new()
        .route("/api/generate", post(generate::submit))
        .route("/api/generate/status/{job_id}", get(generate::status))
        .route(
            "/api/generate/upload-audio",
            post(generate::upload_audio).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/generate/history", get(generate::history))
        .route("/api/generate/audio", get(generate::proxy_audio))
        .route("/api/generate/debug/{task_id}", get(generate::raw_status))
        .route("/api/generate/endpoints", get(generate::endpoints))
        .route("/api/generate/health", get(generate::health))
        .route("/api/generate/format", post(assist::format))
        .route("/api/generate/genlyrics", post(assist::genlyrics));

    if let Some((prefix, root)) = state.local_audio_root() {
        tracing::info!("Serving {} from {}", prefix, root.display());
        app = app.nest_service(&prefix, ServeDir::new(root));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
