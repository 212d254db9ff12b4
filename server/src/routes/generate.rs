//! `/api/generate` handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use songloom::generation::{GenerationJob, GenerationParams, JobView, ReferenceUpload, SubmittedJob};

use super::ApiError;
use crate::auth::AuthUser;
use crate::state::AppState;

const UPLOAD_FIELD: &str = "audio";

pub async fn submit(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<GenerationParams>, JsonRejection>,
) -> Result<Json<SubmittedJob>, ApiError> {
    let Json(params) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let submitted = state.orchestrator.submit(&user_id, params).await?;
    Ok(Json(submitted))
}

pub async fn status(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    Ok(Json(state.orchestrator.poll_status(&job_id, &user_id).await?))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    jobs: Vec<GenerationJob>,
}

pub async fn history(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let jobs = state.orchestrator.history(&user_id)?;
    Ok(Json(HistoryResponse { jobs }))
}

#[derive(Serialize)]
pub struct UploadResponse {
    url: String,
    key: String,
}

pub async fn upload_audio(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_bytes = state.config.server.max_upload_bytes;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge(e.body_text())
            } else {
                ApiError::BadRequest(e.body_text())
            }
        })?;
        upload = Some(ReferenceUpload {
            filename,
            mime_type,
            bytes,
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("Audio file is required".to_string()))?;
    if upload.bytes.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Audio file exceeds {} bytes",
            max_bytes
        )));
    }

    let stored = state.orchestrator.upload_reference(&user_id, upload).await?;
    Ok(Json(UploadResponse {
        url: stored.url,
        key: stored.key,
    }))
}

#[derive(Deserialize)]
pub struct AudioQuery {
    path: Option<String>,
}

/// Streams an asset from the generation service, forwarding its status and
/// content headers. Unauthenticated so `<audio>` elements can load it.
pub async fn proxy_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Path required".to_string()))?;

    let asset = state.client.open_asset_stream(&path).await?;

    let status = StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::builder().status(status);
    if let Some(content_type) = &asset.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(length) = asset.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(asset.body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    raw_response: serde_json::Value,
}

/// Last status body the service sent for a task, for debugging.
pub async fn raw_status(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<RawResponse>, ApiError> {
    let raw_response = state
        .client
        .raw_response(&task_id)
        .ok_or(ApiError::NotFound(
            "Job not found or no raw response available",
        ))?;
    Ok(Json(RawResponse { raw_response }))
}

#[derive(Serialize)]
pub struct EndpointsResponse {
    endpoints: Vec<String>,
}

pub async fn endpoints(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<EndpointsResponse>, ApiError> {
    let endpoints = state.client.discover_endpoints().await?;
    Ok(Json(EndpointsResponse { endpoints }))
}

/// Always 200; an unreachable service reports `healthy: false`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.check_health().await {
        Ok(healthy) => Json(json!({ "healthy": healthy })),
        Err(e) => Json(json!({ "healthy": false, "error": e.to_string() })),
    }
}
