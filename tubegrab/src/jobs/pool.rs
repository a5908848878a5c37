//! Bounded worker pool fed by a task queue.
//!
//! Submitting work only enqueues a [`Task`]; a fixed number of workers
//! drain the queue. The cancellation token is used at shutdown only.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Unit of queued work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Run one job.
    Single(String),
    /// Run a locator batch sequentially.
    Batch(String),
    /// Run a descriptor batch: search pass, then download pass.
    Resolve(String),
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Batch(_) => "batch",
            Self::Resolve(_) => "resolve",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Single(id) | Self::Batch(id) | Self::Resolve(id) => id,
        }
    }
}

/// Executes tasks pulled off the queue.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: Task);
}

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum concurrent workers.
    pub max_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: mpsc::UnboundedSender<Task>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
    active_workers: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            active_workers: Arc::new(AtomicUsize::new(0)),
            cancellation_token: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(None),
        }
    }

    /// Enqueue a task. Never waits for a worker.
    pub fn submit(&self, task: Task) -> Result<()> {
        debug!(kind = task.kind(), id = task.id(), "Task queued");
        self.sender
            .send(task)
            .map_err(|e| Error::Other(format!("worker pool is closed, dropped {} task", e.0.kind())))
    }

    /// Spawn the workers. Calling it again while running is a no-op.
    pub fn start(&self, handler: Arc<dyn TaskHandler>) {
        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            return;
        }

        let workers = self.config.max_workers.max(1);
        info!("Starting worker pool with {} workers", workers);

        let mut join_set = JoinSet::new();
        for i in 0..workers {
            let receiver = self.receiver.clone();
            let handler = handler.clone();
            let cancellation_token = self.cancellation_token.clone();
            let active_workers = self.active_workers.clone();

            join_set.spawn(async move {
                debug!("worker {} started", i);
                loop {
                    let next = {
                        let mut receiver = receiver.lock().await;
                        tokio::select! {
                            _ = cancellation_token.cancelled() => None,
                            task = receiver.recv() => task,
                        }
                    };
                    let Some(task) = next else {
                        break;
                    };

                    let kind = task.kind();
                    let id = task.id().to_string();
                    debug!(kind, id = %id, "worker {} picked task", i);
                    active_workers.fetch_add(1, Ordering::SeqCst);
                    tokio::select! {
                        _ = cancellation_token.cancelled() => {
                            warn!(kind, id = %id, "Task abandoned at shutdown");
                        }
                        _ = handler.handle(task) => {}
                    }
                    active_workers.fetch_sub(1, Ordering::SeqCst);
                }
                debug!("worker {} shutting down", i);
            });
        }
        *tasks = Some(join_set);
    }

    /// Stop all workers and wait for them to exit.
    pub async fn stop(&self) {
        info!("Stopping worker pool");
        self.cancellation_token.cancel();

        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            while join_set.join_next().await.is_some() {}
        }

        info!("Worker pool stopped");
    }

    /// Number of workers currently executing a task.
    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some() && !self.cancellation_token.is_cancelled()
    }

    pub fn max_workers(&self) -> usize {
        self.config.max_workers.max(1)
    }
}
