//! Single job routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use super::{attachment, job_manager};
use crate::api::error::ApiResult;
use crate::api::models::{JobResponse, SubmitJobRequest, SubmitJobResponse};
use crate::api::server::AppState;
use crate::domain::{AudioFormat, Quality};
use crate::utils::filename::artifact_filename;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_job))
        .route("/{id}", get(get_job))
        .route("/{id}/file", get(download_job_file))
}

async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let manager = job_manager(&state)?;
    let quality = Quality::coerce(request.quality.as_ref(), state.default_quality);
    let snapshot = manager.submit_job(&request.locator, quality)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse::from(&snapshot))))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let manager = job_manager(&state)?;
    Ok(Json(manager.get_job(&id)?.into()))
}

async fn download_job_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let manager = job_manager(&state)?;
    let (snapshot, path) = manager.job_artifact(&id).await?;

    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::parse)
        .unwrap_or_else(|| manager.format());
    let filename = artifact_filename(&snapshot.title, format.extension());

    attachment(&path, &filename, format.mime_type()).await
}
