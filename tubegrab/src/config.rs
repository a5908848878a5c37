//! Process configuration loaded from the environment.
//!
//! Every setting has a default. Values that fail to parse are replaced by
//! the default and recorded in [`AppConfig::warnings`]; loading usually
//! happens before the subscriber is installed, so call
//! [`AppConfig::log_warnings`] once logging is up.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::domain::{AudioFormat, Quality};
use crate::extractor::{ClientIdentity, RetryConfig, YtDlpConfig};
use crate::jobs::{JobManagerConfig, LifecycleConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub download_dir: PathBuf,
    pub log_dir: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub cookies_file: Option<PathBuf>,
    /// Fallback order of client identities.
    pub identities: Vec<ClientIdentity>,
    pub transient_retries: u32,
    pub socket_timeout_secs: u64,
    pub attempt_timeout_secs: u64,
    pub default_quality: Quality,
    pub audio_format: AudioFormat,
    pub max_concurrent_tasks: usize,
    pub artifact_ttl_secs: u64,
    pub record_ttl_secs: u64,
    pub archive_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub api: ApiServerConfig,
    /// Problems found while loading, in variable order.
    pub warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            log_dir: PathBuf::from("logs"),
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            cookies_file: None,
            identities: ClientIdentity::DEFAULT_ORDER.to_vec(),
            transient_retries: 2,
            socket_timeout_secs: 30,
            attempt_timeout_secs: 900,
            default_quality: Quality::default(),
            audio_format: AudioFormat::default(),
            max_concurrent_tasks: 4,
            artifact_ttl_secs: 1800,
            record_ttl_secs: 3600,
            archive_ttl_secs: 600,
            sweep_interval_secs: 300,
            api: ApiServerConfig::default(),
            warnings: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from process environment variables, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(dir) = get("DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("YTDLP_PATH") {
            config.ytdlp_path = path;
        }
        if let Some(path) = get("FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }
        config.cookies_file = get("COOKIES_FILE").map(PathBuf::from);

        if let Some(list) = get("CLIENT_IDENTITIES") {
            config.identities = parse_identities(&list, &mut warnings);
        }

        parse_into(&get, "TRANSIENT_RETRIES", &mut config.transient_retries, &mut warnings);
        parse_into(&get, "SOCKET_TIMEOUT_SECS", &mut config.socket_timeout_secs, &mut warnings);
        parse_into(&get, "ATTEMPT_TIMEOUT_SECS", &mut config.attempt_timeout_secs, &mut warnings);
        parse_into(&get, "MAX_CONCURRENT_TASKS", &mut config.max_concurrent_tasks, &mut warnings);
        parse_into(&get, "ARTIFACT_TTL_SECS", &mut config.artifact_ttl_secs, &mut warnings);
        parse_into(&get, "RECORD_TTL_SECS", &mut config.record_ttl_secs, &mut warnings);
        parse_into(&get, "ARCHIVE_TTL_SECS", &mut config.archive_ttl_secs, &mut warnings);
        parse_into(&get, "SWEEP_INTERVAL_SECS", &mut config.sweep_interval_secs, &mut warnings);

        if let Some(value) = get("DEFAULT_QUALITY") {
            match Quality::parse(&value) {
                Some(quality) => config.default_quality = quality,
                None => warnings.push(format!("Invalid DEFAULT_QUALITY {value:?}, using default")),
            }
        }

        if let Some(value) = get("AUDIO_FORMAT") {
            match AudioFormat::parse(&value) {
                Some(format) => config.audio_format = format,
                None => warnings.push(format!("Invalid AUDIO_FORMAT {value:?}, using default")),
            }
        }

        if config.max_concurrent_tasks == 0 {
            warnings.push("MAX_CONCURRENT_TASKS must be at least 1, using 1".to_string());
            config.max_concurrent_tasks = 1;
        }

        if let Some(address) = get("API_BIND_ADDRESS") {
            config.api.bind_address = address;
        }
        parse_into(&get, "API_PORT", &mut config.api.port, &mut warnings);

        config.warnings = warnings;
        config
    }

    /// Emit the loading warnings through `tracing`.
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }

    pub fn ytdlp_config(&self) -> YtDlpConfig {
        YtDlpConfig {
            binary_path: self.ytdlp_path.clone(),
            ffmpeg_path: self.ffmpeg_path.clone(),
            cookies_file: self.cookies_file.clone(),
            socket_timeout_secs: self.socket_timeout_secs,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            ..YtDlpConfig::default()
        }
    }

    pub fn manager_config(&self) -> JobManagerConfig {
        let lifecycle = LifecycleConfig::new(self.download_dir.clone())
            .with_artifact_ttl(Duration::from_secs(self.artifact_ttl_secs))
            .with_record_ttl(Duration::from_secs(self.record_ttl_secs))
            .with_archive_ttl(Duration::from_secs(self.archive_ttl_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs));

        JobManagerConfig::new(self.download_dir.clone())
            .with_format(self.audio_format)
            .with_identities(self.identities.clone())
            .with_retry(RetryConfig::default().with_max_retries(self.transient_retries))
            .with_max_workers(self.max_concurrent_tasks)
            .with_lifecycle(lifecycle)
    }
}

fn parse_into<T, G>(get: &G, key: &str, target: &mut T, warnings: &mut Vec<String>)
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warnings.push(format!("Invalid {key} {raw:?}, using default")),
    }
}

fn parse_identities(list: &str, warnings: &mut Vec<String>) -> Vec<ClientIdentity> {
    let mut identities = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match ClientIdentity::parse(name) {
            Some(identity) if !identities.contains(&identity) => identities.push(identity),
            Some(_) => {}
            None => warnings.push(format!("Unknown client identity {name:?}, skipping")),
        }
    }
    if identities.is_empty() {
        warnings.push("No usable client identities configured, using default order".to_string());
        return ClientIdentity::DEFAULT_ORDER.to_vec();
    }
    identities
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.default_quality, Quality::Kbps192);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
        assert_eq!(config.identities, ClientIdentity::DEFAULT_ORDER.to_vec());
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.api.port, 5000);
        assert!(config.cookies_file.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DOWNLOAD_DIR", "/tmp/out"),
            ("DEFAULT_QUALITY", "320"),
            ("AUDIO_FORMAT", "m4a"),
            ("CLIENT_IDENTITIES", "web, ios"),
            ("TRANSIENT_RETRIES", "5"),
            ("API_PORT", "8080"),
            ("COOKIES_FILE", "cookies.txt"),
        ]);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.default_quality, Quality::Kbps320);
        assert_eq!(config.audio_format, AudioFormat::M4a);
        assert_eq!(
            config.identities,
            vec![ClientIdentity::Web, ClientIdentity::Ios]
        );
        assert_eq!(config.transient_retries, 5);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.cookies_file, Some(PathBuf::from("cookies.txt")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("DEFAULT_QUALITY", "999"),
            ("MAX_CONCURRENT_TASKS", "lots"),
            ("API_PORT", "99999"),
            ("AUDIO_FORMAT", "flac"),
        ]);
        assert_eq!(config.default_quality, Quality::Kbps192);
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.api.port, 5000);
        assert_eq!(config.audio_format, AudioFormat::Mp3);

        assert_eq!(config.warnings.len(), 4, "{:?}", config.warnings);
        assert!(config.warnings.iter().any(|w| w.contains("MAX_CONCURRENT_TASKS")));
        assert!(config.warnings.iter().any(|w| w.contains("\"flac\"")));
    }

    #[test]
    fn test_unknown_identities_are_skipped() {
        let config = load(&[("CLIENT_IDENTITIES", "bogus,android,android")]);
        assert_eq!(config.identities, vec![ClientIdentity::Android]);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("bogus"));

        let config = load(&[("CLIENT_IDENTITIES", "bogus")]);
        assert_eq!(config.identities, ClientIdentity::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn test_zero_workers_clamped() {
        let config = load(&[("MAX_CONCURRENT_TASKS", "0")]);
        assert_eq!(config.max_concurrent_tasks, 1);
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn test_derived_configs() {
        let config = load(&[("ATTEMPT_TIMEOUT_SECS", "60"), ("RECORD_TTL_SECS", "10")]);
        let ytdlp = config.ytdlp_config();
        assert_eq!(ytdlp.attempt_timeout, Duration::from_secs(60));

        let manager = config.manager_config();
        assert_eq!(manager.lifecycle.record_ttl, Duration::from_secs(10));
        assert_eq!(manager.pool.max_workers, 4);
        assert_eq!(manager.retry.max_retries, 2);
    }
}
