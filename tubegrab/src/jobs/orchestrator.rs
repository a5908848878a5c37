//! Sequential batch processing.
//!
//! A batch is processed one member at a time. A member's failure is
//! recorded and processing moves on; only after every member has been
//! visited is the batch marked done.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::registry::{BatchRegistry, JobRegistry};
use super::worker::Worker;
use crate::domain::{Batch, BatchKind, JobSnapshot, Quality};
use crate::{Error, Result};

pub struct BatchOrchestrator {
    jobs: Arc<JobRegistry>,
    batches: Arc<BatchRegistry>,
    worker: Arc<Worker>,
}

impl BatchOrchestrator {
    pub fn new(jobs: Arc<JobRegistry>, batches: Arc<BatchRegistry>, worker: Arc<Worker>) -> Self {
        Self {
            jobs,
            batches,
            worker,
        }
    }

    /// Register every member job as `queued` and the batch as
    /// `processing`. Nothing runs until [`run`](Self::run) is called.
    pub fn prepare(&self, locators: &[String], quality: Quality) -> Result<Batch> {
        if locators.is_empty() {
            return Err(Error::validation("at least one locator is required"));
        }
        if locators.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::validation("locators must not be blank"));
        }

        let members: Vec<JobSnapshot> = locators
            .iter()
            .map(|locator| self.jobs.create(locator.trim(), quality))
            .collect();
        Ok(self
            .batches
            .insert(Batch::new(BatchKind::Locators, quality, &members)))
    }

    pub fn status(&self, batch_id: &str) -> Result<Batch> {
        self.batches.get(batch_id)
    }

    /// Process every member in order, then mark the batch done.
    pub async fn run(&self, batch_id: &str) -> Result<Batch> {
        let batch = self.batches.get(batch_id)?;
        info!(batch_id, total = batch.total(), "Batch processing started");

        for (index, job_id) in batch.member_job_ids().iter().enumerate() {
            self.process_member(batch_id, index, job_id).await?;
        }

        self.finish(batch_id)
    }

    /// Download one member and fold its outcome into the batch.
    pub(crate) async fn process_member(
        &self,
        batch_id: &str,
        index: usize,
        job_id: &str,
    ) -> Result<()> {
        self.batches.update(batch_id, |b| b.set_current(index))?;

        let started = match self.worker.begin(job_id) {
            Ok(started) => started,
            Err(e) => {
                warn!(batch_id, job_id, "Batch member could not start: {}", e);
                return self.record_failure(batch_id, job_id, &e);
            }
        };
        self.batches
            .update(batch_id, |b| b.record_snapshot(&started))?;

        match self.worker.run(&started).await {
            Ok(finished) => self
                .batches
                .update(batch_id, |b| b.record_snapshot(&finished)),
            Err(e) => self.record_failure(batch_id, job_id, &e),
        }
    }

    /// Count a member as failed. If its job record still exists it is
    /// copied as-is; otherwise the batch records the error directly.
    pub(crate) fn record_failure(&self, batch_id: &str, job_id: &str, cause: &Error) -> Result<()> {
        match self.jobs.get(job_id) {
            Ok(snapshot) if snapshot.status.is_terminal() => self
                .batches
                .update(batch_id, |b| b.record_snapshot(&snapshot)),
            _ => {
                let message = cause.to_string();
                self.batches
                    .update(batch_id, |b| b.record_lost_member(job_id, &message))
            }
        }
    }

    pub(crate) fn finish(&self, batch_id: &str) -> Result<Batch> {
        let batch = self.batches.update(batch_id, |b| {
            b.finish()?;
            Ok(b.clone())
        });
        match batch {
            Ok(batch) => {
                info!(
                    batch_id,
                    completed = batch.completed_count(),
                    failed = batch.failed_count(),
                    "Batch finished"
                );
                Ok(batch)
            }
            Err(e) => {
                error!(batch_id, "Batch could not be finished: {}", e);
                Err(e)
            }
        }
    }
}
