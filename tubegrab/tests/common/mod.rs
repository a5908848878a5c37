//! Shared fixtures: scripted collaborators and a manager over a temp dir.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use tubegrab::domain::{Batch, BatchStatus, JobSnapshot, JobStatus};
use tubegrab::extractor::{
    ClientIdentity, EngineError, ExtractOutcome, ExtractRequest, ExtractionEngine, RetryConfig,
    TitleLookup, TrackSearch,
};
use tubegrab::jobs::{Collaborators, JobManager, JobManagerConfig};

pub const IDENTITIES: [ClientIdentity; 3] = [
    ClientIdentity::AndroidMusic,
    ClientIdentity::Android,
    ClientIdentity::Ios,
];

/// How the engine treats one locator.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Succeed on the first identity with this title.
    Succeed(&'static str),
    /// Fail with `"<identity> blocked"` until `identity`, then succeed.
    SucceedOn(ClientIdentity, &'static str),
    /// Fail every identity with `"<identity> blocked"`.
    FailAll,
}

/// Engine scripted per locator. Unscripted locators succeed with a title
/// derived from the locator.
#[derive(Default)]
pub struct ScriptedEngine {
    plans: Mutex<HashMap<String, Plan>>,
    calls: Mutex<Vec<(String, ClientIdentity)>>,
    delay: Mutex<Duration>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn plan(&self, locator: &str, plan: Plan) {
        self.plans.lock().insert(locator.to_string(), plan);
    }

    /// Sleep this long inside every extraction.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<(String, ClientIdentity)> {
        self.calls.lock().clone()
    }

    pub fn identities_tried(&self, locator: &str) -> Vec<ClientIdentity> {
        self.calls
            .lock()
            .iter()
            .filter(|(l, _)| l == locator)
            .map(|(_, identity)| *identity)
            .collect()
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractOutcome, EngineError> {
        self.calls
            .lock()
            .push((request.locator.clone(), request.identity));

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let plan = self.plans.lock().get(&request.locator).cloned();
        let title = match plan {
            None => format!("Title of {}", request.locator),
            Some(Plan::Succeed(title)) => title.to_string(),
            Some(Plan::SucceedOn(identity, title)) if identity == request.identity => {
                title.to_string()
            }
            Some(Plan::SucceedOn(..)) | Some(Plan::FailAll) => {
                return Err(EngineError::extraction(format!(
                    "{} blocked",
                    request.identity
                )));
            }
        };

        let path = request.expected_output();
        tokio::fs::write(&path, b"audio")
            .await
            .map_err(|e| EngineError::fatal(e.to_string()))?;
        Ok(ExtractOutcome {
            title: Some(title),
            artifact_path: Some(path),
        })
    }

    async fn probe_title(
        &self,
        _locator: &str,
        _identity: ClientIdentity,
    ) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}

/// Search over a fixed query table. Unknown queries have no hits.
#[derive(Default)]
pub struct ScriptedSearch {
    hits: Mutex<HashMap<String, String>>,
    broken: Mutex<bool>,
    queries: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl ScriptedSearch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hit(&self, query: &str, locator: &str) {
        self.hits
            .lock()
            .insert(query.to_string(), locator.to_string());
    }

    /// Make every search return an error.
    pub fn break_search(&self) {
        *self.broken.lock() = true;
    }

    /// Sleep this long inside every search.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl TrackSearch for ScriptedSearch {
    async fn search_first(&self, query: &str) -> tubegrab::Result<Option<String>> {
        self.queries.lock().push(query.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.broken.lock() {
            return Err(tubegrab::Error::Other("search backend unavailable".into()));
        }
        Ok(self.hits.lock().get(query).cloned())
    }
}

pub struct NoLookup;

#[async_trait]
impl TitleLookup for NoLookup {
    async fn lookup_title(&self, _locator: &str) -> tubegrab::Result<Option<String>> {
        Ok(None)
    }
}

pub struct Harness {
    pub manager: Arc<JobManager>,
    pub engine: Arc<ScriptedEngine>,
    pub search: Arc<ScriptedSearch>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(customize: impl FnOnce(JobManagerConfig) -> JobManagerConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = ScriptedEngine::new();
        let search = ScriptedSearch::new();

        let config = JobManagerConfig::new(dir.path())
            .with_identities(IDENTITIES.to_vec())
            .with_retry(RetryConfig::immediate(0))
            .with_max_workers(2);
        let manager = Arc::new(JobManager::new(
            customize(config),
            Collaborators {
                engine: engine.clone(),
                search: search.clone(),
                title_lookup: Some(Arc::new(NoLookup)),
            },
        ));
        manager.start();

        Self {
            manager,
            engine,
            search,
            dir,
        }
    }
}

/// Poll until the job is terminal, returning every distinct status seen
/// in order and the final snapshot.
pub async fn watch_job(manager: &JobManager, job_id: &str) -> (Vec<JobStatus>, JobSnapshot) {
    let mut seen: Vec<JobStatus> = Vec::new();
    for _ in 0..1000 {
        let snapshot = manager.get_job(job_id).expect("job exists");
        if seen.last() != Some(&snapshot.status) {
            seen.push(snapshot.status);
        }
        if snapshot.status.is_terminal() {
            return (seen, snapshot);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} did not finish; statuses seen: {seen:?}");
}

pub async fn wait_for_job(manager: &JobManager, job_id: &str) -> JobSnapshot {
    watch_job(manager, job_id).await.1
}

pub async fn wait_for_batch(manager: &JobManager, batch_id: &str) -> Batch {
    for _ in 0..1000 {
        let batch = manager.get_batch(batch_id).expect("batch exists");
        if batch.status() == BatchStatus::Done {
            return batch;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("batch {batch_id} did not finish");
}

/// Order rank of a status along the lifecycle.
pub fn rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Queued => 0,
        JobStatus::Searching => 1,
        JobStatus::Downloading => 2,
        JobStatus::Done | JobStatus::Error => 3,
    }
}
