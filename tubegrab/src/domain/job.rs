//! Job record and its state machine.
//!
//! A job walks `queued → [searching] → downloading → done | error`. The
//! walk only ever advances; terminal states have no outgoing edges. All
//! mutation goes through methods so the field invariants (`artifact_path`
//! set iff done, `error` set iff error) cannot be broken from outside.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::descriptor::TrackDescriptor;
use super::quality::Quality;
use crate::{Error, Result};

/// Title shown before anything better is known.
pub const PLACEHOLDER_TITLE: &str = "Waiting…";

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    /// Looking up a locator for a cross-platform descriptor.
    Searching,
    Downloading,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Searching => "searching",
            Self::Downloading => "downloading",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// `done` and `error` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Queued, Searching | Downloading)
                | (Searching, Downloading | Error)
                | (Downloading, Done | Error)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: JobStatus) -> Result<JobStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempted acquisition.
#[derive(Debug, Clone)]
pub struct Job {
    id: String,
    locator: String,
    descriptor: Option<TrackDescriptor>,
    status: JobStatus,
    title: String,
    quality: Quality,
    artifact_path: Option<PathBuf>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job for a known locator.
    pub fn new(locator: impl Into<String>, quality: Quality) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            locator: locator.into(),
            descriptor: None,
            status: JobStatus::Queued,
            title: PLACEHOLDER_TITLE.to_string(),
            quality,
            artifact_path: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Create a queued job whose locator must first be resolved by search.
    pub fn from_descriptor(descriptor: TrackDescriptor, quality: Quality) -> Self {
        let mut job = Self::new(String::new(), quality);
        job.descriptor = Some(descriptor);
        job
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn descriptor(&self) -> Option<&TrackDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Enter `searching`. Only descriptor-originated jobs may search.
    pub fn begin_search(&mut self) -> Result<()> {
        if self.descriptor.is_none() {
            return Err(Error::validation(format!(
                "job {} has a locator and cannot enter searching",
                self.id
            )));
        }
        self.status = self.status.transition_to(JobStatus::Searching)?;
        Ok(())
    }

    /// Record the locator found by search. Only valid while searching.
    pub fn resolve(&mut self, locator: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Searching {
            return Err(Error::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "resolved".to_string(),
            });
        }
        self.locator = locator.into();
        Ok(())
    }

    /// Enter `downloading`.
    pub fn begin_download(&mut self) -> Result<()> {
        if self.locator.trim().is_empty() {
            return Err(Error::validation(format!(
                "job {} has no locator to download",
                self.id
            )));
        }
        self.status = self.status.transition_to(JobStatus::Downloading)?;
        Ok(())
    }

    /// Enter `done` with the produced artifact.
    pub fn complete(&mut self, title: &str, artifact_path: PathBuf) -> Result<()> {
        if artifact_path.as_os_str().is_empty() {
            return Err(Error::validation("artifact path must not be empty"));
        }
        self.status = self.status.transition_to(JobStatus::Done)?;
        self.set_title(title);
        self.artifact_path = Some(artifact_path);
        self.error = None;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Enter `error` with a human-readable reason.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.status = self.status.transition_to(JobStatus::Error)?;
        let error = error.into();
        self.error = Some(if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        });
        self.artifact_path = None;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Replace the label. Blank values are ignored.
    pub fn set_title(&mut self, title: &str) {
        let title = title.trim();
        if !title.is_empty() {
            self.title = title.to_string();
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            title: self.title.clone(),
            error: self.error.clone(),
            quality: self.quality,
            locator: self.locator.clone(),
            artifact_path: self.artifact_path.clone(),
            created_at: self.created_at,
        }
    }
}

/// Read-only copy of a job handed out by the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub title: String,
    pub error: Option<String>,
    pub quality: Quality,
    pub locator: String,
    #[serde(skip)]
    pub artifact_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_forward_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Searching));
        assert!(Queued.can_transition_to(Downloading));
        assert!(Searching.can_transition_to(Downloading));
        assert!(Searching.can_transition_to(Error));
        assert!(Downloading.can_transition_to(Done));
        assert!(Downloading.can_transition_to(Error));
    }

    #[test]
    fn test_status_no_regression_or_terminal_exit() {
        use JobStatus::*;
        let all = [Queued, Searching, Downloading, Done, Error];
        for from in [Done, Error] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(!Downloading.can_transition_to(Queued));
        assert!(!Downloading.can_transition_to(Searching));
        assert!(!Searching.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Queued));
        assert!(!Queued.can_transition_to(Done));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Downloading).unwrap(), "\"downloading\"");
    }

    #[test]
    fn test_complete_sets_artifact_and_clears_error() {
        let mut job = Job::new("https://youtu.be/x", Quality::Kbps192);
        assert_eq!(job.title(), PLACEHOLDER_TITLE);
        job.begin_download().unwrap();
        job.complete("Song", PathBuf::from("/tmp/a.mp3")).unwrap();
        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.title(), "Song");
        assert_eq!(job.artifact_path(), Some(Path::new("/tmp/a.mp3")));
        assert!(job.error().is_none());
        assert!(job.finished_at().is_some());
    }

    #[test]
    fn test_fail_sets_error_without_artifact() {
        let mut job = Job::new("https://youtu.be/x", Quality::Kbps192);
        job.begin_download().unwrap();
        job.fail("").unwrap();
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some("unknown error"));
        assert!(job.artifact_path().is_none());
    }

    #[test]
    fn test_terminal_job_rejects_further_changes() {
        let mut job = Job::new("https://youtu.be/x", Quality::Kbps192);
        job.begin_download().unwrap();
        job.fail("boom").unwrap();
        assert!(job.complete("x", PathBuf::from("/tmp/a.mp3")).is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(job.error(), Some("boom"));
    }

    #[test]
    fn test_locator_job_cannot_search() {
        let mut job = Job::new("https://youtu.be/x", Quality::Kbps128);
        assert!(job.begin_search().is_err());
        assert_eq!(job.status(), JobStatus::Queued);
    }

    #[test]
    fn test_descriptor_job_needs_locator_before_download() {
        let mut job = Job::from_descriptor(TrackDescriptor::new("T", "A"), Quality::Kbps128);
        assert!(job.begin_download().is_err());
        job.begin_search().unwrap();
        job.resolve("https://www.youtube.com/watch?v=abc").unwrap();
        job.begin_download().unwrap();
        assert_eq!(job.locator(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Job::new("x", Quality::default());
        let b = Job::new("x", Quality::default());
        assert_ne!(a.id(), b.id());
    }
}
