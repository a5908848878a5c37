//! Extraction engine traits and related types.

use std::path::PathBuf;

use async_trait::async_trait;

use super::identity::ClientIdentity;
use crate::Result;
use crate::domain::{AudioFormat, Quality};

/// One extraction attempt under a single client identity.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Download target.
    pub locator: String,
    /// Persona to present upstream.
    pub identity: ClientIdentity,
    /// Target bitrate for the transcoding step.
    pub quality: Quality,
    /// Target container.
    pub format: AudioFormat,
    /// Shared working directory.
    pub output_dir: PathBuf,
    /// Internal identifier the output file is named after.
    pub content_id: String,
}

impl ExtractRequest {
    /// Where the engine is expected to leave the transcoded file.
    pub fn expected_output(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.content_id, self.format.extension()))
    }
}

/// What a successful attempt produced.
#[derive(Debug, Clone, Default)]
pub struct ExtractOutcome {
    /// Title reported by the engine, if any.
    pub title: Option<String>,
    /// Output file reported by the engine. When absent the caller looks
    /// for [`ExtractRequest::expected_output`].
    pub artifact_path: Option<PathBuf>,
}

/// Classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Network or fragment hiccup; worth retrying under the same identity.
    Transient,
    /// The engine ran and refused (blocked, unavailable, sign-in wall).
    Extraction,
    /// The engine could not be run at all.
    Fatal,
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Extraction => "extraction",
            Self::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Transient, message)
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Extraction, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Fatal, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == EngineErrorKind::Transient
    }
}

/// External extraction/transcoding engine.
///
/// A successful `extract` has already transcoded, tagged and embedded the
/// thumbnail; there is no separate post-processing stage.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Download and transcode `request.locator` as `request.identity`.
    async fn extract(&self, request: &ExtractRequest) -> std::result::Result<ExtractOutcome, EngineError>;

    /// Metadata-only pass returning the title without downloading.
    async fn probe_title(
        &self,
        locator: &str,
        identity: ClientIdentity,
    ) -> std::result::Result<Option<String>, EngineError>;
}

/// Search capability of the target platform.
#[async_trait]
pub trait TrackSearch: Send + Sync {
    /// Locator of the first result for `query`, if there is one.
    async fn search_first(&self, query: &str) -> Result<Option<String>>;
}

/// Public, unauthenticated title lookup keyed by locator.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn lookup_title(&self, locator: &str) -> Result<Option<String>>;
}
