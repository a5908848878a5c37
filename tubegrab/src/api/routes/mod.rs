//! API route modules.
//!
//! Organizes routes by resource type.

pub mod batches;
pub mod health;
pub mod jobs;
pub mod logging;
pub mod tracks;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::jobs::JobManager;
use crate::utils::filename::content_disposition;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/jobs", jobs::router())
        .nest("/api/batches", batches::router())
        .nest("/api/tracks", tracks::router())
        .nest("/api/logging", logging::router())
        .nest("/api/health", health::router())
        .with_state(state)
}

pub(crate) fn job_manager(state: &AppState) -> ApiResult<&Arc<JobManager>> {
    state
        .job_manager
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job manager not available"))
}

/// Stream a file from disk as an attachment.
pub(crate) async fn attachment(path: &Path, filename: &str, mime: &str) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::artifact_missing(format!("{} is no longer available", filename))
        } else {
            tracing::error!(path = %path.display(), error = %e, "Failed to open artifact");
            ApiError::internal("Failed to open file")
        }
    })?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let disposition = HeaderValue::from_str(&content_disposition(filename))
        .map_err(|_| ApiError::internal("Invalid attachment filename"))?;
    let content_type = HeaderValue::from_str(mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}
