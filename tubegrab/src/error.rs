//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Every client identity in the fallback list was exhausted.
    #[error("extraction failed on every client identity: {last_error}")]
    ExtractionFailure { last_error: String },

    /// Cross-platform search produced no candidate locator.
    #[error("no match found")]
    ResolutionFailure { query: String },

    /// The engine reported success but no output file could be located.
    #[error("extraction reported success but no artifact was produced for {content_id}")]
    ArtifactMissing { content_id: String },

    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: String, id: String },

    /// Retrieval attempted before the job reached `done`.
    #[error("job {id} is not ready (status: {status})")]
    NotReady { id: String, status: String },

    #[error("batch {batch_id} has no completed artifacts to package")]
    NothingToPackage { batch_id: String },

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
