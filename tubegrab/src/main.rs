use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tubegrab::api::{ApiServer, AppState};
use tubegrab::config::AppConfig;
use tubegrab::extractor::{OEmbedTitleLookup, YtDlpEngine};
use tubegrab::jobs::{Collaborators, JobManager};
use tubegrab::utils::http_client::build_http_client;
use tubegrab::{logging, preflight};

/// Pollable audio extraction service.
#[derive(Parser, Debug)]
#[command(name = "tubegrab", version, about)]
struct Args {
    /// Run the startup checks, print the report and exit
    #[arg(long)]
    check: bool,

    /// HTTP port, overrides API_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Artifact working directory, overrides DOWNLOAD_DIR
    #[arg(long)]
    download_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::from_env_or_default();
    if let Some(port) = args.port {
        config.api = config.api.with_port(port);
    }
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }

    if args.check {
        for warning in &config.warnings {
            eprintln!("warning: {warning}");
        }
        let report = preflight::run(&config).await;
        print!("{}", report.render());
        if !report.all_passed() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let (logging_config, _log_guard) =
        logging::init_logging(&config.log_dir).context("Failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "tubegrab starting");
    config.log_warnings();

    let report = preflight::run(&config).await;
    report.log();
    if !report.all_passed() {
        warn!("Some preflight checks failed; starting anyway");
    }

    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.child_token());

    let engine = Arc::new(YtDlpEngine::new(config.ytdlp_config()));
    let http_client =
        build_http_client(Duration::from_secs(10)).context("Failed to build HTTP client")?;
    let collaborators = Collaborators {
        engine: engine.clone(),
        search: engine,
        title_lookup: Some(Arc::new(OEmbedTitleLookup::new(http_client))),
    };

    let manager = Arc::new(JobManager::new(config.manager_config(), collaborators));
    manager.start();

    let state = AppState::new()
        .with_job_manager(manager.clone())
        .with_logging_config(logging_config)
        .with_default_quality(config.default_quality)
        .with_versions(report.extractor_version, report.transcoder_version);
    let server = ApiServer::with_state(config.api.clone(), state);

    let server_token = server.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        server_token.cancel();
    });

    let result = server.run().await;

    shutdown.cancel();
    manager.stop().await;
    info!("tubegrab stopped");

    result.context("API server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
