//! Startup checks for the external binaries and local resources.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::extractor::YtDlpEngine;
use crate::utils::fs;

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightCheck {
    pub name: String,
    pub passed: bool,
    /// Version string on success, reason on failure.
    pub detail: String,
    pub duration_ms: Option<u64>,
}

impl PreflightCheck {
    pub fn passed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
            duration_ms: None,
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<PreflightCheck>,
    pub extractor_version: Option<String>,
    pub transcoder_version: Option<String>,
}

impl PreflightReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PreflightCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Log every check; failures are warnings.
    pub fn log(&self) {
        for check in &self.checks {
            if check.passed {
                info!(check = %check.name, detail = %check.detail, "Preflight check passed");
            } else {
                warn!(check = %check.name, detail = %check.detail, "Preflight check failed");
            }
        }
    }

    /// Human-readable summary for `--check`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for check in &self.checks {
            let mark = if check.passed { "ok  " } else { "FAIL" };
            out.push_str(&format!("[{}] {}: {}\n", mark, check.name, check.detail));
        }
        out
    }
}

/// Run every check against the given configuration.
pub async fn run(config: &AppConfig) -> PreflightReport {
    let mut report = PreflightReport::default();

    let started = Instant::now();
    let extractor = YtDlpEngine::detect_version(&config.ytdlp_path, "--version").await;
    report.checks.push(
        binary_check("extractor", &config.ytdlp_path, extractor.as_deref())
            .with_duration(started.elapsed()),
    );
    report.extractor_version = extractor;

    let started = Instant::now();
    let transcoder = YtDlpEngine::detect_version(&config.ffmpeg_path, "-version").await;
    report.checks.push(
        binary_check("transcoder", &config.ffmpeg_path, transcoder.as_deref())
            .with_duration(started.elapsed()),
    );
    report.transcoder_version = transcoder;

    let started = Instant::now();
    report
        .checks
        .push(check_download_dir(&config.download_dir).await.with_duration(started.elapsed()));

    let started = Instant::now();
    report.checks.push(
        check_port(&config.api.bind_address, config.api.port)
            .await
            .with_duration(started.elapsed()),
    );

    report
}

fn binary_check(name: &str, binary: &str, version: Option<&str>) -> PreflightCheck {
    match version {
        Some(version) => PreflightCheck::passed(name, version),
        None => PreflightCheck::failed(name, format!("`{}` did not respond", binary)),
    }
}

/// The directory exists (or can be created) and accepts a new file.
pub async fn check_download_dir(dir: &Path) -> PreflightCheck {
    const NAME: &str = "download_dir";

    if let Err(e) = fs::ensure_dir_all(dir).await {
        return PreflightCheck::failed(NAME, e.to_string());
    }

    let probe_dir = dir.to_path_buf();
    let probe = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".tubegrab-probe")
            .tempfile_in(&probe_dir)
            .map(drop)
    })
    .await;

    match probe {
        Ok(Ok(())) => PreflightCheck::passed(NAME, format!("{} is writable", dir.display())),
        Ok(Err(e)) => PreflightCheck::failed(NAME, format!("{} is not writable: {}", dir.display(), e)),
        Err(e) => PreflightCheck::failed(NAME, format!("write probe did not complete: {}", e)),
    }
}

/// The listener address can be bound right now.
pub async fn check_port(bind_address: &str, port: u16) -> PreflightCheck {
    const NAME: &str = "port";
    let addr = format!("{}:{}", bind_address, port);
    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            drop(listener);
            PreflightCheck::passed(NAME, format!("{} is available", addr))
        }
        Err(e) => PreflightCheck::failed(NAME, format!("cannot bind {}: {}", addr, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_all_passed() {
        let mut report = PreflightReport::default();
        assert!(report.all_passed());

        report.checks.push(PreflightCheck::passed("a", "fine"));
        assert!(report.all_passed());

        report.checks.push(PreflightCheck::failed("b", "broken"));
        assert!(!report.all_passed());
        assert_eq!(report.failures().count(), 1);
        assert!(report.render().contains("[FAIL] b: broken"));
    }

    #[test]
    fn test_binary_check() {
        assert!(binary_check("extractor", "yt-dlp", Some("2024.01.01")).passed);
        let failed = binary_check("extractor", "yt-dlp", None);
        assert!(!failed.passed);
        assert!(failed.detail.contains("yt-dlp"));
    }

    #[tokio::test]
    async fn test_download_dir_created_and_writable() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let check = check_download_dir(&nested).await;
        assert!(check.passed, "{}", check.detail);
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_port_in_use_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let check = check_port("127.0.0.1", port).await;
        assert!(!check.passed);
        drop(listener);
    }

    #[tokio::test]
    async fn test_missing_binaries_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.ytdlp_path = "/nonexistent/yt-dlp".into();
        config.ffmpeg_path = "/nonexistent/ffmpeg".into();
        config.download_dir = dir.path().to_path_buf();
        config.api.bind_address = "127.0.0.1".into();
        config.api.port = 0;

        let report = run(&config).await;
        assert!(!report.all_passed());
        assert!(report.extractor_version.is_none());
        assert!(report.transcoder_version.is_none());
        assert_eq!(report.failures().count(), 2);
    }
}
