//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Batch, BatchMember, BatchStatus, JobSnapshot, JobStatus, Quality, RequestedQuality,
    TrackDescriptor,
};

/// `POST /api/jobs`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobRequest {
    pub locator: String,
    /// Number or numeric string; anything unsupported is coerced.
    #[serde(default)]
    pub quality: Option<RequestedQuality>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub quality: Quality,
}

impl From<&JobSnapshot> for SubmitJobResponse {
    fn from(snapshot: &JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id.clone(),
            status: snapshot.status,
            quality: snapshot.quality,
        }
    }
}

/// Poll view of a single job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub title: String,
    pub error: Option<String>,
    pub quality: Quality,
    /// Empty until a descriptor job is resolved.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub locator: String,
    pub created_at: DateTime<Utc>,
}

impl From<JobSnapshot> for JobResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id,
            status: snapshot.status,
            title: snapshot.title,
            error: snapshot.error,
            quality: snapshot.quality,
            locator: snapshot.locator,
            created_at: snapshot.created_at,
        }
    }
}

/// `POST /api/batches`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBatchRequest {
    #[serde(default)]
    pub locators: Vec<String>,
    #[serde(default)]
    pub quality: Option<RequestedQuality>,
}

/// `POST /api/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTracksRequest {
    #[serde(default)]
    pub descriptors: Vec<TrackDescriptor>,
    #[serde(default)]
    pub quality: Option<RequestedQuality>,
}

/// Returned by both batch submission routes.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitBatchResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub quality: Quality,
    pub total: usize,
    pub members: Vec<BatchMember>,
}

impl From<Batch> for SubmitBatchResponse {
    fn from(batch: Batch) -> Self {
        Self {
            batch_id: batch.id().to_string(),
            status: batch.status(),
            quality: batch.quality(),
            total: batch.total(),
            members: batch.members().to_vec(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub extractor_version: Option<String>,
    pub transcoder_version: Option<String>,
    pub jobs: usize,
    pub batches: usize,
    pub active_workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_job_request_quality_forms() {
        let req: SubmitJobRequest =
            serde_json::from_str(r#"{"locator": "https://x", "quality": 320}"#).unwrap();
        assert_eq!(
            Quality::coerce(req.quality.as_ref(), Quality::Kbps192),
            Quality::Kbps320
        );

        let req: SubmitJobRequest =
            serde_json::from_str(r#"{"locator": "https://x", "quality": "256"}"#).unwrap();
        assert_eq!(
            Quality::coerce(req.quality.as_ref(), Quality::Kbps192),
            Quality::Kbps256
        );

        let req: SubmitJobRequest =
            serde_json::from_str(r#"{"locator": "https://x", "quality": [1]}"#).unwrap();
        assert_eq!(
            Quality::coerce(req.quality.as_ref(), Quality::Kbps192),
            Quality::Kbps192
        );

        let req: SubmitJobRequest = serde_json::from_str(r#"{"locator": "https://x"}"#).unwrap();
        assert!(req.quality.is_none());
    }

    #[test]
    fn test_tracks_request_artist_optional() {
        let req: SubmitTracksRequest =
            serde_json::from_str(r#"{"descriptors": [{"title": "T"}, {"title": "U", "artist": "A"}]}"#)
                .unwrap();
        assert_eq!(req.descriptors.len(), 2);
        assert_eq!(req.descriptors[1].artist, "A");
    }
}
