//! Cross-platform descriptor resolution.
//!
//! Two explicit passes over the member list. The search pass moves every
//! member into `searching` and either attaches a locator or fails it. The
//! download pass then runs the ordinary batch step, but only for members
//! that resolved. A member that found no match never enters `downloading`.

use std::sync::Arc;

use tracing::{info, warn};

use super::orchestrator::BatchOrchestrator;
use super::registry::{BatchRegistry, JobRegistry};
use super::worker::Worker;
use crate::domain::{Batch, BatchKind, JobSnapshot, Quality, TrackDescriptor};
use crate::extractor::TrackSearch;
use crate::{Error, Result};

pub struct CrossPlatformResolver {
    jobs: Arc<JobRegistry>,
    batches: Arc<BatchRegistry>,
    worker: Arc<Worker>,
    orchestrator: Arc<BatchOrchestrator>,
    search: Arc<dyn TrackSearch>,
}

impl CrossPlatformResolver {
    pub fn new(
        jobs: Arc<JobRegistry>,
        batches: Arc<BatchRegistry>,
        worker: Arc<Worker>,
        orchestrator: Arc<BatchOrchestrator>,
        search: Arc<dyn TrackSearch>,
    ) -> Self {
        Self {
            jobs,
            batches,
            worker,
            orchestrator,
            search,
        }
    }

    /// Register one queued job per descriptor under a new batch.
    pub fn prepare(&self, descriptors: &[TrackDescriptor], quality: Quality) -> Result<Batch> {
        if descriptors.is_empty() {
            return Err(Error::validation("at least one descriptor is required"));
        }
        for descriptor in descriptors {
            descriptor.validate()?;
        }

        let members: Vec<JobSnapshot> = descriptors
            .iter()
            .map(|d| self.jobs.create_from_descriptor(d.clone(), quality))
            .collect();
        Ok(self
            .batches
            .insert(Batch::new(BatchKind::Descriptors, quality, &members)))
    }

    /// Search pass, then download pass, then mark the batch done.
    pub async fn run(&self, batch_id: &str) -> Result<Batch> {
        let batch = self.batches.get(batch_id)?;
        let member_ids = batch.member_job_ids();
        info!(batch_id, total = batch.total(), "Descriptor batch started");

        let mut resolved = Vec::with_capacity(member_ids.len());
        for (index, job_id) in member_ids.iter().enumerate() {
            if self.search_member(batch_id, index, job_id).await? {
                resolved.push((index, job_id));
            }
        }

        info!(
            batch_id,
            resolved = resolved.len(),
            unresolved = member_ids.len() - resolved.len(),
            "Search pass complete"
        );

        for (index, job_id) in resolved {
            self.orchestrator
                .process_member(batch_id, index, job_id)
                .await?;
        }

        self.orchestrator.finish(batch_id)
    }

    /// Returns whether the member resolved to a locator.
    async fn search_member(&self, batch_id: &str, index: usize, job_id: &str) -> Result<bool> {
        self.batches.update(batch_id, |b| b.set_current(index))?;

        let searching = match self.jobs.update(job_id, |job| {
            job.begin_search()?;
            Ok(job.snapshot())
        }) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(batch_id, job_id, "Descriptor member could not start: {}", e);
                self.orchestrator.record_failure(batch_id, job_id, &e)?;
                return Ok(false);
            }
        };
        self.batches
            .update(batch_id, |b| b.record_snapshot(&searching))?;

        let query = self
            .jobs
            .update(job_id, |job| {
                Ok(job.descriptor().map(TrackDescriptor::search_query))
            })?
            .unwrap_or_default();

        let failure = match self.search.search_first(&query).await {
            Ok(Some(locator)) => {
                let resolved = self.jobs.update(job_id, |job| {
                    job.resolve(locator.clone())?;
                    Ok(job.snapshot())
                })?;
                info!(job_id, query = %query, locator = %locator, "Descriptor resolved");
                self.batches
                    .update(batch_id, |b| b.record_snapshot(&resolved))?;
                return Ok(true);
            }
            Ok(None) => Error::ResolutionFailure { query }.to_string(),
            Err(e) => format!("search failed: {}", e),
        };

        warn!(job_id, "Descriptor not resolved: {}", failure);
        let failed = self.worker.fail(job_id, &failure)?;
        self.batches
            .update(batch_id, |b| b.record_snapshot(&failed))?;
        Ok(false)
    }
}
