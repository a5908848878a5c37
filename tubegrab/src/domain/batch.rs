//! Batch record: an ordered group of jobs tracked together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{JobSnapshot, JobStatus};
use super::quality::Quality;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Done,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the batch was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Plain locators, downloaded in order.
    Locators,
    /// Cross-platform descriptors, searched first and then downloaded.
    Descriptors,
}

/// Denormalized copy of a member job's observable fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMember {
    pub job_id: String,
    pub status: JobStatus,
    pub title: String,
    pub error: Option<String>,
}

impl From<&JobSnapshot> for BatchMember {
    fn from(snapshot: &JobSnapshot) -> Self {
        Self {
            job_id: snapshot.job_id.clone(),
            status: snapshot.status,
            title: snapshot.title.clone(),
            error: snapshot.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    #[serde(rename = "batch_id")]
    id: String,
    kind: BatchKind,
    status: BatchStatus,
    quality: Quality,
    total: usize,
    completed_count: usize,
    failed_count: usize,
    current_index: usize,
    members: Vec<BatchMember>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create a processing batch over already-registered jobs, in order.
    pub fn new(kind: BatchKind, quality: Quality, members: &[JobSnapshot]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: BatchStatus::Processing,
            quality,
            total: members.len(),
            completed_count: 0,
            failed_count: 0,
            current_index: 0,
            members: members.iter().map(BatchMember::from).collect(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn members(&self) -> &[BatchMember] {
        &self.members
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn member_job_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.job_id.clone()).collect()
    }

    fn ensure_processing(&self) -> Result<()> {
        if self.status == BatchStatus::Done {
            return Err(Error::InvalidStateTransition {
                from: BatchStatus::Done.as_str().to_string(),
                to: BatchStatus::Processing.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn set_current(&mut self, index: usize) -> Result<()> {
        self.ensure_processing()?;
        if index >= self.total {
            return Err(Error::validation(format!(
                "index {} out of range for batch of {}",
                index, self.total
            )));
        }
        self.current_index = index;
        Ok(())
    }

    /// Copy a member job's latest snapshot into the batch.
    ///
    /// The first time a member is seen in a terminal state the matching
    /// counter is incremented; later snapshots of the same member only
    /// refresh the denormalized fields.
    pub fn record_snapshot(&mut self, snapshot: &JobSnapshot) -> Result<()> {
        self.ensure_processing()?;
        let member = self
            .members
            .iter_mut()
            .find(|m| m.job_id == snapshot.job_id)
            .ok_or_else(|| Error::not_found("Batch member", snapshot.job_id.clone()))?;

        let was_terminal = member.status.is_terminal();
        *member = BatchMember::from(snapshot);

        if !was_terminal {
            match snapshot.status {
                JobStatus::Done => self.completed_count += 1,
                JobStatus::Error => self.failed_count += 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Count a member as failed when its job record is no longer available.
    pub fn record_lost_member(&mut self, job_id: &str, error: &str) -> Result<()> {
        self.ensure_processing()?;
        let member = self
            .members
            .iter_mut()
            .find(|m| m.job_id == job_id)
            .ok_or_else(|| Error::not_found("Batch member", job_id))?;
        if !member.status.is_terminal() {
            member.status = JobStatus::Error;
            member.error = Some(error.to_string());
            self.failed_count += 1;
        }
        Ok(())
    }

    /// Mark the batch done. Every member must have reached a terminal state.
    pub fn finish(&mut self) -> Result<()> {
        self.ensure_processing()?;
        if self.completed_count + self.failed_count != self.total {
            return Err(Error::validation(format!(
                "batch {} finished with {} of {} members accounted for",
                self.id,
                self.completed_count + self.failed_count,
                self.total
            )));
        }
        self.status = BatchStatus::Done;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
