//! MergeAI daemon entry point.
//!
//! Loads configuration, opens the artifact store, wires the merge engine into
//! the orchestrator, starts the web server and artifact sweeper, and handles
//! graceful shutdown.

mod signals;
mod sweeper;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mergeai_core::config::AppConfig;
use mergeai_core::engine::ProcessEngine;
use mergeai_core::orchestrator::MergeOrchestrator;
use mergeai_core::store::ArtifactStore;
use mergeai_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// MergeAI merge orchestration daemon.
#[derive(Parser, Debug)]
#[command(
    name = "mergeai-daemon",
    version,
    about = "Two-phase merge service around an external merge engine"
)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path).context("failed to load configuration file")?,
        None => AppConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.web.listen = listen.clone();
    }
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  MergeAI Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    match &args.config {
        Some(path) => info!("Config file   : {}", path.display()),
        None => info!("Config file   : (defaults)"),
    }
    info!(
        "Engine        : {} {}",
        config.engine.program,
        config.engine.args.join(" ")
    );
    info!("Engine timeout: {}s", config.engine.timeout_secs);
    info!("Store root    : {}", config.store.root.display());
    match config.store.max_age() {
        Some(age) => info!("Artifact TTL  : {}s", age.as_secs()),
        None => info!("Artifact TTL  : disabled"),
    }
    info!("Web listen    : {}", config.web.listen);
    info!("Log level     : {}", log_level);
    info!("========================================");

    // Open the artifact store
    let store = ArtifactStore::open(&config.store.root)
        .await
        .context("failed to create artifact store directory")?;

    // Wire the engine into the orchestrator
    let engine = Arc::new(ProcessEngine::from_config(&config.engine));
    let orchestrator = MergeOrchestrator::new(store.clone(), engine)
        .with_download_prefix(config.web.download_prefix.clone())
        .with_merged_extension(config.store.merged_extension.clone());
    info!("Merge orchestrator initialized");

    // Start web server in background
    let web_server = WebServer::new(config.web.clone(), orchestrator);
    let listen_addr = config.web.listen.clone();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start(&listen_addr).await {
            error!("Web server error: {}", e);
        }
    });

    // Start the sweeper if eviction is enabled
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let sweeper = config.store.max_age().map(|max_age| {
        let interval = std::time::Duration::from_secs(config.store.sweep_interval_secs);
        let sweeper = sweeper::Sweeper::new(store.clone(), max_age, interval);
        let stats = sweeper.stats();
        let sweeper_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            sweeper.run(sweeper_shutdown).await;
        });
        (handle, stats)
    });

    // Wait for shutdown signal
    let signal = signals::wait_for_shutdown().await;

    info!(?signal, "Shutdown signal received, stopping...");

    if let Some((handle, stats)) = sweeper {
        shutdown.notify_one();
        match tokio::time::timeout(std::time::Duration::from_secs(10), handle).await {
            Ok(Ok(())) => info!(
                cycles = stats.total_cycles.load(Ordering::SeqCst),
                evicted = stats.total_evicted.load(Ordering::SeqCst),
                errors = stats.total_errors.load(Ordering::SeqCst),
                "sweeper stopped gracefully"
            ),
            Ok(Err(e)) => warn!("sweeper task error: {}", e),
            Err(_) => warn!("sweeper did not stop within 10s, forcing shutdown"),
        }
    }

    // Abort the web server
    web_handle.abort();

    info!("MergeAI daemon stopped.");
    Ok(())
}
