//! Client-identity fallback around the extraction engine.
//!
//! Identities are tried strictly in order and the first success wins.
//! Within one identity, transient failures are retried with backoff; any
//! other failure moves on to the next identity. Only when the list is
//! exhausted does the acquisition fail, carrying the last error seen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{EngineError, ExtractOutcome, ExtractRequest, ExtractionEngine, TitleLookup};
use super::identity::ClientIdentity;
use super::retry::RetryConfig;
use crate::domain::{AudioFormat, PLACEHOLDER_TITLE, Quality};
use crate::utils::fs::remove_files_with_prefix;
use crate::{Error, Result};

/// Title used when every lookup came back empty.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

const PLACEHOLDER_VALUES: &[&str] = &["na", "n/a", "none", "null", "unknown", "untitled"];

/// Whether `title` carries no usable information.
pub fn is_placeholder_title(title: &str) -> bool {
    let trimmed = title.trim();
    trimmed.is_empty()
        || trimmed == PLACEHOLDER_TITLE
        || trimmed.eq_ignore_ascii_case(UNKNOWN_TITLE)
        || PLACEHOLDER_VALUES
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// Result of a successful acquisition.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub title: String,
    pub artifact_path: PathBuf,
    /// Identity that produced the artifact.
    pub identity: ClientIdentity,
    /// Identities tried, in order, ending with the successful one.
    pub attempts: Vec<ClientIdentity>,
}

pub struct FallbackStrategy {
    engine: Arc<dyn ExtractionEngine>,
    title_lookup: Option<Arc<dyn TitleLookup>>,
    identities: Vec<ClientIdentity>,
    retry: RetryConfig,
    format: AudioFormat,
    output_dir: PathBuf,
}

impl FallbackStrategy {
    pub fn new(engine: Arc<dyn ExtractionEngine>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            title_lookup: None,
            identities: ClientIdentity::DEFAULT_ORDER.to_vec(),
            retry: RetryConfig::default(),
            format: AudioFormat::default(),
            output_dir: output_dir.into(),
        }
    }

    /// Set the fallback order. An empty list keeps the default order.
    pub fn with_identities(mut self, identities: Vec<ClientIdentity>) -> Self {
        if !identities.is_empty() {
            self.identities = identities;
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_title_lookup(mut self, lookup: Arc<dyn TitleLookup>) -> Self {
        self.title_lookup = Some(lookup);
        self
    }

    pub fn identities(&self) -> &[ClientIdentity] {
        &self.identities
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Produce an artifact for `locator`, trying each identity in order.
    pub async fn acquire(&self, locator: &str, quality: Quality) -> Result<Acquisition> {
        let content_id = Uuid::new_v4().simple().to_string();
        let mut attempts = Vec::with_capacity(self.identities.len());
        let mut last_error: Option<String> = None;

        for &identity in &self.identities {
            attempts.push(identity);
            let request = ExtractRequest {
                locator: locator.to_string(),
                identity,
                quality,
                format: self.format,
                output_dir: self.output_dir.clone(),
                content_id: content_id.clone(),
            };

            match self.attempt(&request).await {
                Ok(outcome) => {
                    let artifact_path = self.locate_artifact(&request, &outcome).await?;
                    let title = self.refine_title(locator, outcome.title).await;
                    info!(
                        identity = %identity,
                        attempts = attempts.len(),
                        path = %artifact_path.display(),
                        "Extraction succeeded"
                    );
                    return Ok(Acquisition {
                        title,
                        artifact_path,
                        identity,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(
                        identity = %identity,
                        kind = e.kind.as_str(),
                        "Client identity failed, trying next: {}",
                        e
                    );
                    last_error = Some(e.message);
                    let leftovers =
                        remove_files_with_prefix(&self.output_dir, &format!("{}.", content_id))
                            .await;
                    if leftovers > 0 {
                        debug!(identity = %identity, count = leftovers, "Removed partial output");
                    }
                }
            }
        }

        Err(Error::ExtractionFailure {
            last_error: last_error.unwrap_or_else(|| "no client identities configured".to_string()),
        })
    }

    /// One identity, with local retries for transient failures.
    async fn attempt(
        &self,
        request: &ExtractRequest,
    ) -> std::result::Result<ExtractOutcome, EngineError> {
        let mut retries = 0;
        loop {
            match self.engine.extract(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && self.retry.should_retry(retries) => {
                    retries += 1;
                    let delay = self.retry.delay_for_attempt(retries);
                    debug!(
                        identity = %request.identity,
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Find the file a successful attempt produced.
    async fn locate_artifact(
        &self,
        request: &ExtractRequest,
        outcome: &ExtractOutcome,
    ) -> Result<PathBuf> {
        if let Some(ref reported) = outcome.artifact_path
            && is_file(reported).await
        {
            return Ok(reported.clone());
        }

        let expected = request.expected_output();
        if is_file(&expected).await {
            return Ok(expected);
        }

        // The transcoder may have settled on a different extension.
        if let Ok(mut entries) = tokio::fs::read_dir(&request.output_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let matches = path
                    .file_stem()
                    .is_some_and(|stem| stem == request.content_id.as_str());
                if matches && is_file(&path).await {
                    return Ok(path);
                }
            }
        }

        Err(Error::ArtifactMissing {
            content_id: request.content_id.clone(),
        })
    }

    /// First non-placeholder title wins: primary pass, then a
    /// metadata-only probe through the identity list, then the public
    /// lookup.
    async fn refine_title(&self, locator: &str, primary: Option<String>) -> String {
        if let Some(title) = primary.filter(|t| !is_placeholder_title(t)) {
            return title.trim().to_string();
        }

        for &identity in &self.identities {
            match self.engine.probe_title(locator, identity).await {
                Ok(Some(title)) if !is_placeholder_title(&title) => {
                    debug!(identity = %identity, "Title recovered by metadata probe");
                    return title.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => debug!(identity = %identity, "Title probe failed: {}", e),
            }
        }

        if let Some(ref lookup) = self.title_lookup {
            match lookup.lookup_title(locator).await {
                Ok(Some(title)) if !is_placeholder_title(&title) => {
                    debug!("Title recovered by public lookup");
                    return title.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => debug!("Public title lookup failed: {}", e),
            }
        }

        UNKNOWN_TITLE.to_string()
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
