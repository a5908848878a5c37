//! Artifact lifecycle: deferred deletion, record eviction and packaging.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::registry::{BatchRegistry, JobRegistry};
use crate::domain::{JobSnapshot, JobStatus};
use crate::utils::filename::{artifact_filename, dedupe_filename};
use crate::utils::fs::{ensure_dir_all, files_older_than, remove_file_best_effort};
use crate::{Error, Result};

/// Subdirectory of the download directory holding batch archives.
pub const ARCHIVE_DIR: &str = "archives";

/// Configuration for the artifact lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Shared working directory.
    pub download_dir: PathBuf,
    /// Delay before a produced file is deleted.
    pub artifact_ttl: Duration,
    /// Delay before a terminal job record is evicted.
    pub record_ttl: Duration,
    /// Delay before a batch archive is deleted.
    pub archive_ttl: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
}

impl LifecycleConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            artifact_ttl: Duration::from_secs(1800),
            record_ttl: Duration::from_secs(3600),
            archive_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
        }
    }

    pub fn with_artifact_ttl(mut self, ttl: Duration) -> Self {
        self.artifact_ttl = ttl;
        self
    }

    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    pub fn with_archive_ttl(mut self, ttl: Duration) -> Self {
        self.archive_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.download_dir.join(ARCHIVE_DIR)
    }
}

/// What one sweep pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub records_evicted: usize,
    pub files_removed: usize,
}

pub struct ArtifactLifecycle {
    config: LifecycleConfig,
    jobs: Arc<JobRegistry>,
    batches: Arc<BatchRegistry>,
}

impl ArtifactLifecycle {
    pub fn new(config: LifecycleConfig, jobs: Arc<JobRegistry>, batches: Arc<BatchRegistry>) -> Self {
        Self {
            config,
            jobs,
            batches,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Delete `path` once, after `delay`. Deletion errors are swallowed.
    pub fn schedule_cleanup(&self, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        debug!(path = %path.display(), delay_secs = delay.as_secs(), "Cleanup scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            remove_file_best_effort(&path).await;
        })
    }

    /// Remove the job record once, after `delay`.
    pub fn schedule_eviction(&self, job_id: String, delay: Duration) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if jobs.remove(&job_id) {
                debug!(job_id = %job_id, "Job record evicted");
            }
        })
    }

    /// Arrange the deferred cleanup of a job that just reached a terminal
    /// state.
    pub fn on_terminal(&self, snapshot: &JobSnapshot) {
        if !snapshot.status.is_terminal() {
            return;
        }
        if let Some(ref path) = snapshot.artifact_path {
            self.schedule_cleanup(path.clone(), self.config.artifact_ttl);
        }
        self.schedule_eviction(snapshot.job_id.clone(), self.config.record_ttl);
    }

    /// Write every completed member's artifact into one zip archive.
    pub async fn package_batch(&self, batch_id: &str) -> Result<PathBuf> {
        let batch = self.batches.get(batch_id)?;

        let mut entries = Vec::new();
        for member in batch.members() {
            if member.status != JobStatus::Done {
                continue;
            }
            let Ok(job) = self.jobs.get(&member.job_id) else {
                continue;
            };
            let Some(path) = job.artifact_path else {
                continue;
            };
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            entries.push((path, artifact_filename(&member.title, &extension)));
        }

        if entries.is_empty() {
            return Err(Error::NothingToPackage {
                batch_id: batch_id.to_string(),
            });
        }

        let archive_dir = self.config.archive_dir();
        ensure_dir_all(&archive_dir).await?;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let archive_path = archive_dir.join(format!("{}-{}.zip", batch_id, &suffix[..8]));

        let target = archive_path.clone();
        let count = entries.len();
        tokio::task::spawn_blocking(move || write_zip_archive(&entries, &target))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))??;

        info!(batch_id, entries = count, path = %archive_path.display(), "Batch packaged");
        self.schedule_cleanup(archive_path.clone(), self.config.archive_ttl);
        Ok(archive_path)
    }

    /// One pass: evict stale terminal records and delete old files left
    /// behind by lost timers or earlier runs.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let record_ttl = chrono::Duration::from_std(self.config.record_ttl)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = chrono::Utc::now()
            .checked_sub_signed(record_ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let records_evicted = self.jobs.evict_terminal_before(cutoff);

        // Judge artifacts by when their job finished, not by file mtime.
        let artifact_ttl = chrono::Duration::from_std(self.config.artifact_ttl)
            .unwrap_or(chrono::Duration::MAX);
        let grace_start = chrono::Utc::now()
            .checked_sub_signed(artifact_ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let in_grace = self.jobs.artifacts_finished_since(grace_start);

        let mut files_removed = 0;
        for path in files_older_than(&self.config.download_dir, self.config.artifact_ttl).await? {
            if in_grace.contains(&path) {
                debug!(path = %path.display(), "Artifact still within its grace period");
                continue;
            }
            if remove_file_best_effort(&path).await {
                files_removed += 1;
            }
        }
        for path in files_older_than(&self.config.archive_dir(), self.config.archive_ttl).await? {
            if remove_file_best_effort(&path).await {
                files_removed += 1;
            }
        }

        Ok(SweepReport {
            records_evicted,
            files_removed,
        })
    }

    /// Start the periodic sweep.
    pub fn start_sweeper(self: &Arc<Self>, cancellation_token: CancellationToken) -> JoinHandle<()> {
        let lifecycle = self.clone();
        let period = self.config.sweep_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // first tick fires immediately
            ticker.tick().await;

            info!(interval_secs = period.as_secs(), "Artifact sweeper started");

            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        info!("Artifact sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match lifecycle.sweep().await {
                            Ok(report) if report != SweepReport::default() => {
                                info!(
                                    records = report.records_evicted,
                                    files = report.files_removed,
                                    "Sweep removed stale entries"
                                );
                            }
                            Ok(_) => debug!("Sweep found nothing to remove"),
                            Err(e) => error!("Sweep failed: {}", e),
                        }
                    }
                }
            }
        })
    }
}

/// Write `(source, entry name)` pairs into a deflate zip at `target`.
fn write_zip_archive(entries: &[(PathBuf, String)], target: &Path) -> Result<()> {
    let file = File::create(target).map_err(|e| Error::io_path("creating archive", target, e))?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut taken = HashSet::new();
    for (source, name) in entries {
        let name = dedupe_filename(name, &mut taken);
        let mut input =
            File::open(source).map_err(|e| Error::io_path("opening artifact", source, e))?;
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut input, &mut zip)
            .map_err(|e| Error::io_path("archiving artifact", source, e))?;
    }

    zip.finish()?;
    Ok(())
}
