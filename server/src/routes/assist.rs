//! Caption formatting and lyrics drafting.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use songloom::assist::{AssistError, FormatRequest, FormattedCaption, GeneratedLyrics, LyricsRequest};

use super::ApiError;
use crate::auth::AuthUser;
use crate::state::AppState;

pub async fn format(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<FormatRequest>, JsonRejection>,
) -> Result<Json<FormattedCaption>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request.validate()?;

    let formatter = state
        .formatter
        .as_ref()
        .ok_or(AssistError::NotConfigured("caption formatter"))?;
    Ok(Json(formatter.format_caption(request).await?))
}

pub async fn genlyrics(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<LyricsRequest>, JsonRejection>,
) -> Result<Json<GeneratedLyrics>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.writer.generate_lyrics(request).await?))
}
