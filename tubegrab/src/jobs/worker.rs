//! Drives one job through the fallback strategy.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::lifecycle::ArtifactLifecycle;
use super::registry::JobRegistry;
use crate::Result;
use crate::domain::JobSnapshot;
use crate::extractor::FallbackStrategy;
use crate::utils::fs::remove_file_best_effort;

/// The only writer of a job once it leaves `queued`.
pub struct Worker {
    jobs: Arc<JobRegistry>,
    strategy: Arc<FallbackStrategy>,
    lifecycle: Arc<ArtifactLifecycle>,
}

impl Worker {
    pub fn new(
        jobs: Arc<JobRegistry>,
        strategy: Arc<FallbackStrategy>,
        lifecycle: Arc<ArtifactLifecycle>,
    ) -> Self {
        Self {
            jobs,
            strategy,
            lifecycle,
        }
    }

    /// Move a job into `downloading`.
    pub fn begin(&self, job_id: &str) -> Result<JobSnapshot> {
        self.jobs.update(job_id, |job| {
            job.begin_download()?;
            Ok(job.snapshot())
        })
    }

    /// Run the fallback strategy for a job already in `downloading` and
    /// record the terminal outcome.
    pub async fn run(&self, started: &JobSnapshot) -> Result<JobSnapshot> {
        let job_id = started.job_id.as_str();

        let finished = match self
            .strategy
            .acquire(&started.locator, started.quality)
            .await
        {
            Ok(acquisition) => {
                let path = acquisition.artifact_path.clone();
                let recorded = self.jobs.update(job_id, |job| {
                    job.complete(&acquisition.title, acquisition.artifact_path.clone())?;
                    Ok(job.snapshot())
                });
                if recorded.is_err() {
                    remove_file_best_effort(&path).await;
                }
                recorded
            }
            Err(e) => {
                warn!(job_id, "Job failed: {}", e);
                self.jobs.update(job_id, |job| {
                    job.fail(e.to_string())?;
                    Ok(job.snapshot())
                })
            }
        };

        match finished {
            Ok(snapshot) => {
                info!(job_id, status = %snapshot.status, title = %snapshot.title, "Job finished");
                self.lifecycle.on_terminal(&snapshot);
                Ok(snapshot)
            }
            Err(e) => {
                error!(job_id, "Could not record job outcome: {}", e);
                Err(e)
            }
        }
    }

    /// `begin` followed by `run`.
    pub async fn process(&self, job_id: &str) -> Result<JobSnapshot> {
        let started = self.begin(job_id)?;
        self.run(&started).await
    }

    /// Fail a job without running the strategy.
    pub fn fail(&self, job_id: &str, message: &str) -> Result<JobSnapshot> {
        let snapshot = self.jobs.update(job_id, |job| {
            job.fail(message)?;
            Ok(job.snapshot())
        })?;
        self.lifecycle.on_terminal(&snapshot);
        Ok(snapshot)
    }
}
