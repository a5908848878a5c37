//! In-memory job and batch registries.
//!
//! Each registry is one map behind one lock. Callers get snapshots, never
//! references into the map, and every write is a read-modify-write applied
//! under the lock. A mutation that fails leaves the stored record as it was.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{Batch, Job, JobSnapshot, Quality, TrackDescriptor};
use crate::{Error, Result};

/// Concurrency-safe map of jobs keyed by id.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, job: Job) -> JobSnapshot {
        let snapshot = job.snapshot();
        self.jobs.lock().insert(job.id().to_string(), job);
        debug!(job_id = %snapshot.job_id, "Job registered");
        snapshot
    }

    /// Register a queued job for a known locator.
    pub fn create(&self, locator: impl Into<String>, quality: Quality) -> JobSnapshot {
        self.insert(Job::new(locator, quality))
    }

    /// Register a queued job that must be resolved by search first.
    pub fn create_from_descriptor(
        &self,
        descriptor: TrackDescriptor,
        quality: Quality,
    ) -> JobSnapshot {
        self.insert(Job::from_descriptor(descriptor, quality))
    }

    pub fn get(&self, id: &str) -> Result<JobSnapshot> {
        self.jobs
            .lock()
            .get(id)
            .map(Job::snapshot)
            .ok_or_else(|| Error::not_found("Job", id))
    }

    /// Apply `mutation` atomically. The change is committed only if the
    /// mutation returns `Ok`.
    pub fn update<T>(&self, id: &str, mutation: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        let mut jobs = self.jobs.lock();
        let stored = jobs.get_mut(id).ok_or_else(|| Error::not_found("Job", id))?;
        let mut draft = stored.clone();
        let value = mutation(&mut draft)?;
        *stored = draft;
        Ok(value)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    pub(crate) fn remove(&self, id: &str) -> bool {
        self.jobs.lock().remove(id).is_some()
    }

    /// Drop terminal records that finished before `cutoff`.
    pub(crate) fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.status().is_terminal() && job.finished_at().unwrap_or(job.created_at()) < cutoff)
        });
        before - jobs.len()
    }

    /// Artifact paths of done jobs that finished at or after `cutoff`.
    pub(crate) fn artifacts_finished_since(&self, cutoff: DateTime<Utc>) -> HashSet<PathBuf> {
        self.jobs
            .lock()
            .values()
            .filter(|job| job.finished_at().is_some_and(|at| at >= cutoff))
            .filter_map(|job| job.artifact_path().map(PathBuf::from))
            .collect()
    }
}

/// Concurrency-safe map of batches keyed by id. Batches are never evicted.
#[derive(Default)]
pub struct BatchRegistry {
    batches: Mutex<HashMap<String, Batch>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, batch: Batch) -> Batch {
        self.batches
            .lock()
            .insert(batch.id().to_string(), batch.clone());
        debug!(batch_id = %batch.id(), total = batch.total(), "Batch registered");
        batch
    }

    pub fn get(&self, id: &str) -> Result<Batch> {
        self.batches
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("Batch", id))
    }

    /// Apply `mutation` atomically, committing only on `Ok`.
    pub fn update<T>(
        &self,
        id: &str,
        mutation: impl FnOnce(&mut Batch) -> Result<T>,
    ) -> Result<T> {
        let mut batches = self.batches.lock();
        let stored = batches
            .get_mut(id)
            .ok_or_else(|| Error::not_found("Batch", id))?;
        let mut draft = stored.clone();
        let value = mutation(&mut draft)?;
        *stored = draft;
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }
}
