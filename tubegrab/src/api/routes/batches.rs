//! Batch routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use super::{attachment, job_manager};
use crate::api::error::ApiResult;
use crate::api::models::{SubmitBatchRequest, SubmitBatchResponse};
use crate::api::server::AppState;
use crate::domain::{Batch, Quality};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_batch))
        .route("/{id}", get(get_batch))
        .route("/{id}/archive", get(download_archive))
}

async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<SubmitBatchRequest>,
) -> ApiResult<(StatusCode, Json<SubmitBatchResponse>)> {
    let manager = job_manager(&state)?;
    let quality = Quality::coerce(request.quality.as_ref(), state.default_quality);
    let batch = manager.submit_batch(&request.locators, quality)?;
    Ok((StatusCode::ACCEPTED, Json(batch.into())))
}

async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Batch>> {
    let manager = job_manager(&state)?;
    Ok(Json(manager.get_batch(&id)?))
}

/// Zip the completed members and stream the archive.
async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let manager = job_manager(&state)?;
    let archive = manager.package_batch(&id).await?;
    attachment(&archive, &format!("{}.zip", id), "application/zip").await
}
