//! Domain layer for tubegrab.
//!
//! Entities (jobs, batches) and value objects (quality, format, descriptor).

pub mod batch;
pub mod descriptor;
pub mod job;
pub mod quality;

pub use batch::{Batch, BatchKind, BatchMember, BatchStatus};
pub use descriptor::TrackDescriptor;
pub use job::{Job, JobSnapshot, JobStatus, PLACEHOLDER_TITLE};
pub use quality::{AudioFormat, Quality, RequestedQuality};
