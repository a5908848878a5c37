//! Cross-platform submission: descriptors in, resolved downloads out.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use super::job_manager;
use crate::api::error::ApiResult;
use crate::api::models::{SubmitBatchResponse, SubmitTracksRequest};
use crate::api::server::AppState;
use crate::domain::Quality;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_tracks))
}

/// Poll the returned batch via `/api/batches/{id}`.
async fn submit_tracks(
    State(state): State<AppState>,
    Json(request): Json<SubmitTracksRequest>,
) -> ApiResult<(StatusCode, Json<SubmitBatchResponse>)> {
    let manager = job_manager(&state)?;
    let quality = Quality::coerce(request.quality.as_ref(), state.default_quality);
    let batch = manager.submit_descriptors(&request.descriptors, quality)?;
    Ok((StatusCode::ACCEPTED, Json(batch.into())))
}
