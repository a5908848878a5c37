//! Health check routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::models::HealthResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    let (jobs, batches, active_workers) = state
        .job_manager
        .as_ref()
        .map(|m| (m.job_count(), m.batch_count(), m.active_workers()))
        .unwrap_or_default();

    // Degraded when the extractor never answered its version probe.
    let status = if state.extractor_version.is_some() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        extractor_version: state.extractor_version.clone(),
        transcoder_version: state.transcoder_version.clone(),
        jobs,
        batches,
        active_workers,
    })
}
