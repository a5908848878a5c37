//! Job orchestration: registries, workers, batches and artifact lifecycle.

pub mod lifecycle;
pub mod manager;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod worker;

pub use lifecycle::{ArtifactLifecycle, LifecycleConfig, SweepReport};
pub use manager::{Collaborators, JobManager, JobManagerConfig};
pub use orchestrator::BatchOrchestrator;
pub use pool::{Task, TaskHandler, WorkerPool, WorkerPoolConfig};
pub use registry::{BatchRegistry, JobRegistry};
pub use resolver::CrossPlatformResolver;
pub use worker::Worker;
