//! CloudSync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Alternating reconciliation cycles against the storage service
//! - Pushing settled local changes through the watch bridge
//! - Pause/resume on SIGUSR1/SIGUSR2
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon loads the YAML configuration and the credentials record, wires
//! the HTTP remote adapter and the local filesystem adapter into a
//! `SyncEngine`, and hands the engine to a `SyncLoop`. The loop is controlled
//! by a `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT;
//! a running cycle finishes its current action before the daemon exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cloudsync_core::config::{Config, Credentials, LoggingConfig};
use cloudsync_core::ports::remote_storage::CredentialToken;
use cloudsync_remote::provider::HttpRemoteStorage;
use cloudsync_sync::engine::{EngineSettings, SyncEngine};
use cloudsync_sync::filesystem::LocalFileSystemAdapter;
use cloudsync_sync::sync_loop::{SyncLoop, SyncToggle};
use cloudsync_sync::watch_bridge::WatchBridge;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "cloudsyncd", version, about = "CloudSync background synchronization daemon")]
struct Cli {
    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use alternate credentials file
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Run a single upload pass and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    /// Loads the configuration named on the command line, or the default one
    ///
    /// An explicitly named file must exist and parse; the default location
    /// falls back to built-in defaults when absent.
    fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load_or_default(&Config::default_path()),
        };

        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", details.join("; "));
        }
        Ok(config)
    }

    fn credentials_path(&self, config: &Config) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(|| config.credentials_path())
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

/// Reads the credential token; a missing or empty token is a startup error
fn load_token(path: &Path) -> Result<CredentialToken> {
    let credentials = Credentials::load(path)
        .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
    match credentials.token() {
        Some(token) => Ok(token.clone()),
        None => bail!("No credential token in {}; sign in first", path.display()),
    }
}

/// `RUST_LOG` wins over the configured level
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the engine and drives it until shutdown
struct DaemonService {
    config: Config,
    engine: Arc<SyncEngine>,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, token: CredentialToken, shutdown: CancellationToken) -> Result<Self> {
        let remote = HttpRemoteStorage::from_config(&config.remote)?;
        let engine = Arc::new(SyncEngine::new(
            Arc::new(remote),
            Arc::new(LocalFileSystemAdapter::new()),
            token,
            EngineSettings::from_config(&config),
        ));

        Ok(Self {
            config,
            engine,
            shutdown,
        })
    }

    /// Runs exactly one non-deletion cycle without the watcher
    async fn run_once(&self) -> Result<()> {
        let report = self
            .engine
            .run_cycle(false, &self.shutdown)
            .await
            .context("Reconciliation cycle failed")?;

        info!(
            downloaded = report.downloaded,
            uploaded = report.uploaded,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "Single cycle finished"
        );
        if !report.failures.is_empty() {
            bail!("{} transfer(s) failed", report.failures.len());
        }
        Ok(())
    }

    /// Runs the alternating loop with the watch bridge until shutdown
    async fn run(&self) -> Result<()> {
        let bridge = WatchBridge::from_config(Arc::clone(&self.engine), &self.config.sync);
        let sync_loop = SyncLoop::new(Arc::clone(&self.engine), self.config.sync.cycle_delay())
            .with_watch_bridge(bridge);

        let toggle_task = tokio::spawn(toggle_signals(sync_loop.toggle(), self.shutdown.clone()));

        let cycles = sync_loop.run(self.shutdown.clone()).await;
        toggle_task.abort();

        info!(cycles, "Sync loop finished");
        Ok(())
    }
}

// ============================================================================
// Signal handlers
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Maps SIGUSR1 to disable and SIGUSR2 to enable synchronization
#[cfg(unix)]
async fn toggle_signals(toggle: SyncToggle, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut disable, mut enable) = match (
        signal(SignalKind::user_defined1()),
        signal(SignalKind::user_defined2()),
    ) {
        (Ok(disable), Ok(enable)) => (disable, enable),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Pause/resume signals unavailable");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = disable.recv() => {
                info!("Received SIGUSR1");
                toggle.disable();
            }
            _ = enable.recv() => {
                info!("Received SIGUSR2");
                toggle.enable();
            }
        }
    }
}

#[cfg(not(unix))]
async fn toggle_signals(_toggle: SyncToggle, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_tracing(&config.logging);
    info!(sync_root = %config.sync_root().display(), "CloudSync daemon starting (cloudsyncd)");

    let token = load_token(&cli.credentials_path(&config))?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, token, shutdown_token)?;
    let result = if cli.once {
        service.run_once().await
    } else {
        service.run().await
    };

    match &result {
        Ok(()) => info!("CloudSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "CloudSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
