//! yt-dlp extraction engine.
//!
//! yt-dlp does the download, the ffmpeg transcode, thumbnail embedding and
//! tag writing in one process run, so a successful `extract` leaves a
//! finished artifact behind.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::engine::{EngineError, ExtractOutcome, ExtractRequest, ExtractionEngine, TrackSearch};
use super::identity::ClientIdentity;
use crate::{Error, Result};

const TITLE_PREFIX: &str = "title:";
const FILEPATH_PREFIX: &str = "filepath:";

/// Lowercased stderr fragments that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "connection aborted",
    "remote end closed",
    "temporary failure in name resolution",
    "name or service not known",
    "getaddrinfo failed",
    "nodename nor servname",
    "incompleteread",
    "http error 429",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
    "fragment",
];

/// Process-level settings for the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// yt-dlp binary.
    pub binary_path: String,
    /// Handed to yt-dlp via `--ffmpeg-location`.
    pub ffmpeg_path: String,
    /// Netscape cookie file.
    pub cookies_file: Option<PathBuf>,
    /// yt-dlp's own `--retries`/`--fragment-retries`.
    pub network_retries: u32,
    /// `--socket-timeout`.
    pub socket_timeout_secs: u64,
    /// Hard cap on one process run.
    pub attempt_timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            cookies_file: None,
            network_retries: 3,
            socket_timeout_secs: 30,
            attempt_timeout: Duration::from_secs(900),
        }
    }
}

/// Collected output of one process run.
#[derive(Debug, Default)]
struct RunOutput {
    stdout: Vec<String>,
    stderr: Vec<String>,
    success: bool,
}

/// yt-dlp-backed [`ExtractionEngine`] and [`TrackSearch`].
pub struct YtDlpEngine {
    config: YtDlpConfig,
}

impl YtDlpEngine {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YtDlpConfig {
        &self.config
    }

    /// Run `<binary> <flag>` and return the first line of output.
    pub async fn detect_version(binary: &str, flag: &str) -> Option<String> {
        let output = Command::new(binary)
            .arg(flag)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
    }

    fn common_args(&self, identity: ClientIdentity) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", identity.player_client()),
        ];
        if let Some(ref cookies) = self.config.cookies_file {
            args.extend(["--cookies".to_string(), cookies.to_string_lossy().into_owned()]);
        }
        args
    }

    fn build_extract_args(&self, request: &ExtractRequest) -> Vec<String> {
        let output_template = request
            .output_dir
            .join(format!("{}.%(ext)s", request.content_id));

        let mut args = vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            request.format.as_str().to_string(),
            "--audio-quality".to_string(),
            request.quality.bitrate_arg(),
            "--embed-thumbnail".to_string(),
            "--add-metadata".to_string(),
            "--newline".to_string(),
            // Never resume another attempt's partial file.
            "--no-continue".to_string(),
            // The sweeper ages files by mtime; keep it at write time.
            "--no-mtime".to_string(),
            "--retries".to_string(),
            self.config.network_retries.to_string(),
            "--fragment-retries".to_string(),
            self.config.network_retries.to_string(),
            "--ffmpeg-location".to_string(),
            self.config.ffmpeg_path.clone(),
        ];
        args.extend(self.common_args(request.identity));
        args.extend([
            "--no-simulate".to_string(),
            "--print".to_string(),
            format!("{TITLE_PREFIX}%(title)s"),
            "--print".to_string(),
            format!("after_move:{FILEPATH_PREFIX}%(filepath)s"),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            request.locator.clone(),
        ]);
        args
    }

    fn build_probe_args(&self, locator: &str, identity: ClientIdentity) -> Vec<String> {
        let mut args = vec!["--skip-download".to_string()];
        args.extend(self.common_args(identity));
        args.extend([
            "--print".to_string(),
            "%(title)s".to_string(),
            locator.to_string(),
        ]);
        args
    }

    fn build_search_args(&self, query: &str) -> Vec<String> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
        ];
        if let Some(ref cookies) = self.config.cookies_file {
            args.extend(["--cookies".to_string(), cookies.to_string_lossy().into_owned()]);
        }
        args.extend([
            "--print".to_string(),
            "%(id)s".to_string(),
            format!("ytsearch1:{query}"),
        ]);
        args
    }

    async fn run(&self, args: &[String]) -> std::result::Result<RunOutput, EngineError> {
        debug!(binary = %self.config.binary_path, ?args, "Spawning yt-dlp");

        let mut command = Command::new(&self.config.binary_path);
        command
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            EngineError::fatal(format!(
                "failed to spawn {}: {}",
                self.config.binary_path, e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::fatal("failed to capture yt-dlp stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::fatal("failed to capture yt-dlp stderr"))?;

        let run = async {
            let (stdout, stderr) =
                tokio::join!(collect_lines(stdout, "stdout"), collect_lines(stderr, "stderr"));
            let status = child.wait().await;
            (stdout, stderr, status)
        };

        let result = tokio::time::timeout(self.config.attempt_timeout, run).await;
        match result {
            Ok((stdout, stderr, Ok(status))) => Ok(RunOutput {
                stdout,
                stderr,
                success: status.success(),
            }),
            Ok((_, _, Err(e))) => Err(EngineError::fatal(format!(
                "failed to wait for yt-dlp: {}",
                e
            ))),
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Failed to kill timed out yt-dlp");
                }
                Err(EngineError::extraction(format!(
                    "yt-dlp did not finish within {}s",
                    self.config.attempt_timeout.as_secs()
                )))
            }
        }
    }
}

async fn collect_lines<R: AsyncRead + Unpin>(reader: R, stream: &'static str) -> Vec<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(stream, "{}", line);
        collected.push(line);
    }
    collected
}

/// Classify a failed run from its stderr.
///
/// The last `ERROR:` line decides. Without one, the last non-empty line is
/// reported as an extraction error.
pub fn classify_failure(stderr: &[String]) -> EngineError {
    let last_error = stderr
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| line.starts_with("ERROR:"));

    match last_error {
        Some(line) if is_transient(line) => EngineError::transient(line),
        Some(line) => EngineError::extraction(line),
        None => {
            let tail = stderr
                .iter()
                .rev()
                .map(|line| line.trim())
                .find(|line| !line.is_empty())
                .unwrap_or("yt-dlp exited with an error");
            if is_transient(tail) {
                EngineError::transient(tail)
            } else {
                EngineError::extraction(tail)
            }
        }
    }
}

fn is_transient(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn prefixed_value(lines: &[String], prefix: &str) -> Option<String> {
    lines
        .iter()
        .rev()
        .filter_map(|line| line.trim().strip_prefix(prefix))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        request: &ExtractRequest,
    ) -> std::result::Result<ExtractOutcome, EngineError> {
        crate::utils::fs::ensure_dir_all(&request.output_dir)
            .await
            .map_err(|e| EngineError::fatal(e.to_string()))?;

        let args = self.build_extract_args(request);
        let output = self.run(&args).await?;

        if !output.success {
            let err = classify_failure(&output.stderr);
            warn!(
                identity = %request.identity,
                kind = err.kind.as_str(),
                "yt-dlp extraction failed: {}",
                err
            );
            return Err(err);
        }

        Ok(ExtractOutcome {
            title: prefixed_value(&output.stdout, TITLE_PREFIX),
            artifact_path: prefixed_value(&output.stdout, FILEPATH_PREFIX).map(PathBuf::from),
        })
    }

    async fn probe_title(
        &self,
        locator: &str,
        identity: ClientIdentity,
    ) -> std::result::Result<Option<String>, EngineError> {
        let args = self.build_probe_args(locator, identity);
        let output = self.run(&args).await?;
        if !output.success {
            return Err(classify_failure(&output.stderr));
        }
        Ok(output
            .stdout
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }
}

#[async_trait]
impl TrackSearch for YtDlpEngine {
    async fn search_first(&self, query: &str) -> Result<Option<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let args = self.build_search_args(query);
        let output = self
            .run(&args)
            .await
            .map_err(|e| Error::Other(e.message))?;

        if !output.success {
            return Err(Error::Other(classify_failure(&output.stderr).message));
        }

        Ok(output
            .stdout
            .iter()
            .map(|line| line.trim())
            .find(|id| !id.is_empty() && *id != "NA")
            .map(|id| format!("https://www.youtube.com/watch?v={id}")))
    }
}
