use crate::error::{AppError, Result};
use crate::model::{CreateUrlRequest, UrlResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::Json;
use snaplink_core::ShortId;
use tracing::debug;

/// Malformed ids can never have been issued, so they are simply not found.
fn parse_short_id(raw: String) -> Result<ShortId> {
    ShortId::parse(raw.as_str()).map_err(|e| {
        debug!(error = %e, "rejecting malformed short id");
        AppError::NotFound(raw)
    })
}

pub async fn create_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<Json<UrlResponse>> {
    let Json(request) = payload?;
    let record = state.shortener().create_or_reuse(&request.source_url).await?;
    Ok(Json(UrlResponse::from_record(record, state.base_url())))
}

pub async fn redirect_handler(
    Path(short_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let short_id = parse_short_id(short_id)?;
    let source_url = state.redirector().resolve(&short_id).await?;
    Ok(Redirect::temporary(&source_url))
}

pub async fn stats_handler(
    Path(short_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UrlResponse>> {
    let short_id = parse_short_id(short_id)?;
    let record = state.redirector().stats(&short_id).await?;
    Ok(Json(UrlResponse::from_record(record, state.base_url())))
}
