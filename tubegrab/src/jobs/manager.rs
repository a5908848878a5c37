//! Facade wiring registries, workers and the lifecycle together.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::lifecycle::{ArtifactLifecycle, LifecycleConfig};
use super::orchestrator::BatchOrchestrator;
use super::pool::{Task, TaskHandler, WorkerPool, WorkerPoolConfig};
use super::registry::{BatchRegistry, JobRegistry};
use super::resolver::CrossPlatformResolver;
use super::worker::Worker;
use crate::domain::{AudioFormat, Batch, JobSnapshot, JobStatus, Quality, TrackDescriptor};
use crate::extractor::{
    ClientIdentity, ExtractionEngine, FallbackStrategy, RetryConfig, TitleLookup, TrackSearch,
};
use crate::{Error, Result};

/// Configuration for the job manager.
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    pub format: AudioFormat,
    pub identities: Vec<ClientIdentity>,
    pub retry: RetryConfig,
    pub pool: WorkerPoolConfig,
    pub lifecycle: LifecycleConfig,
}

impl JobManagerConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            format: AudioFormat::default(),
            identities: ClientIdentity::DEFAULT_ORDER.to_vec(),
            retry: RetryConfig::default(),
            pool: WorkerPoolConfig::default(),
            lifecycle: LifecycleConfig::new(download_dir),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_identities(mut self, identities: Vec<ClientIdentity>) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.pool.max_workers = max_workers;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }
}

/// External collaborators the manager drives.
pub struct Collaborators {
    pub engine: Arc<dyn ExtractionEngine>,
    pub search: Arc<dyn TrackSearch>,
    pub title_lookup: Option<Arc<dyn TitleLookup>>,
}

/// Routes queued tasks to the component that owns them.
struct Dispatcher {
    worker: Arc<Worker>,
    orchestrator: Arc<BatchOrchestrator>,
    resolver: Arc<CrossPlatformResolver>,
}

#[async_trait]
impl TaskHandler for Dispatcher {
    async fn handle(&self, task: Task) {
        let result = match &task {
            Task::Single(job_id) => self.worker.process(job_id).await.map(|_| ()),
            Task::Batch(batch_id) => self.orchestrator.run(batch_id).await.map(|_| ()),
            Task::Resolve(batch_id) => self.resolver.run(batch_id).await.map(|_| ()),
        };
        if let Err(e) = result {
            error!(kind = task.kind(), id = task.id(), "Task failed: {}", e);
        }
    }
}

/// Entry point for submitting and observing work.
pub struct JobManager {
    config: JobManagerConfig,
    jobs: Arc<JobRegistry>,
    batches: Arc<BatchRegistry>,
    lifecycle: Arc<ArtifactLifecycle>,
    orchestrator: Arc<BatchOrchestrator>,
    resolver: Arc<CrossPlatformResolver>,
    dispatcher: Arc<Dispatcher>,
    pool: WorkerPool,
    cancellation_token: CancellationToken,
}

impl JobManager {
    pub fn new(config: JobManagerConfig, collaborators: Collaborators) -> Self {
        let jobs = Arc::new(JobRegistry::new());
        let batches = Arc::new(BatchRegistry::new());
        let lifecycle = Arc::new(ArtifactLifecycle::new(
            config.lifecycle.clone(),
            jobs.clone(),
            batches.clone(),
        ));

        let mut strategy = FallbackStrategy::new(
            collaborators.engine,
            config.lifecycle.download_dir.clone(),
        )
        .with_identities(config.identities.clone())
        .with_retry(config.retry.clone())
        .with_format(config.format);
        if let Some(lookup) = collaborators.title_lookup {
            strategy = strategy.with_title_lookup(lookup);
        }

        let worker = Arc::new(Worker::new(
            jobs.clone(),
            Arc::new(strategy),
            lifecycle.clone(),
        ));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            jobs.clone(),
            batches.clone(),
            worker.clone(),
        ));
        let resolver = Arc::new(CrossPlatformResolver::new(
            jobs.clone(),
            batches.clone(),
            worker.clone(),
            orchestrator.clone(),
            collaborators.search,
        ));
        let dispatcher = Arc::new(Dispatcher {
            worker,
            orchestrator: orchestrator.clone(),
            resolver: resolver.clone(),
        });

        Self {
            pool: WorkerPool::new(config.pool.clone()),
            config,
            jobs,
            batches,
            lifecycle,
            orchestrator,
            resolver,
            dispatcher,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &JobManagerConfig {
        &self.config
    }

    pub fn format(&self) -> AudioFormat {
        self.config.format
    }

    /// Start the workers and the background sweeper.
    pub fn start(&self) {
        self.pool.start(self.dispatcher.clone());
        self.lifecycle
            .start_sweeper(self.cancellation_token.child_token());
        info!(
            workers = self.pool.max_workers(),
            download_dir = %self.config.lifecycle.download_dir.display(),
            "Job manager started"
        );
    }

    pub async fn stop(&self) {
        self.cancellation_token.cancel();
        self.pool.stop().await;
    }

    /// Register and enqueue a single job.
    pub fn submit_job(&self, locator: &str, quality: Quality) -> Result<JobSnapshot> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(Error::validation("locator must not be empty"));
        }
        let snapshot = self.jobs.create(locator, quality);
        info!(job_id = %snapshot.job_id, locator, quality = %quality, "Job submitted");
        self.pool.submit(Task::Single(snapshot.job_id.clone()))?;
        Ok(snapshot)
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobSnapshot> {
        self.jobs.get(job_id)
    }

    /// The artifact of a finished job.
    pub async fn job_artifact(&self, job_id: &str) -> Result<(JobSnapshot, PathBuf)> {
        let snapshot = self.jobs.get(job_id)?;
        if snapshot.status != JobStatus::Done {
            return Err(Error::NotReady {
                id: job_id.to_string(),
                status: snapshot.status.to_string(),
            });
        }
        let path = snapshot
            .artifact_path
            .clone()
            .ok_or_else(|| Error::ArtifactMissing {
                content_id: job_id.to_string(),
            })?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Error::ArtifactMissing {
                content_id: job_id.to_string(),
            });
        }
        Ok((snapshot, path))
    }

    /// Register a batch of locators and enqueue it as one task.
    pub fn submit_batch(&self, locators: &[String], quality: Quality) -> Result<Batch> {
        let batch = self.orchestrator.prepare(locators, quality)?;
        info!(batch_id = %batch.id(), total = batch.total(), "Batch submitted");
        self.pool.submit(Task::Batch(batch.id().to_string()))?;
        Ok(batch)
    }

    /// Register a batch of descriptors and enqueue it as one task.
    pub fn submit_descriptors(
        &self,
        descriptors: &[TrackDescriptor],
        quality: Quality,
    ) -> Result<Batch> {
        let batch = self.resolver.prepare(descriptors, quality)?;
        info!(batch_id = %batch.id(), total = batch.total(), "Descriptor batch submitted");
        self.pool.submit(Task::Resolve(batch.id().to_string()))?;
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: &str) -> Result<Batch> {
        self.orchestrator.status(batch_id)
    }

    /// Zip every completed member of a batch.
    pub async fn package_batch(&self, batch_id: &str) -> Result<PathBuf> {
        self.lifecycle.package_batch(batch_id).await
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn active_workers(&self) -> usize {
        self.pool.active_count()
    }
}
