//! blobshared: the blobshare daemon.
//!
//! Assembles the admission service:
//! - State store (redb)
//! - Ledger validator + file transport
//! - Admission pipeline
//! - REST API
//!
//! # Usage
//!
//! ```text
//! blobshared serve --config blobshare.toml --port 5000 --data-dir ./data
//! blobshared check-config --config blobshare.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use blobshare_core::BlobshareConfig;
use blobshare_scheduler::{AdmissionPipeline, RetryPolicy};
use blobshare_state::StateStore;
use blobshared::{FileTransport, LedgerValidator, telemetry};

#[derive(Parser)]
#[command(name = "blobshared", about = "blobshare admission daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the intake API and admission pipeline.
    Serve {
        /// Path to blobshare.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Parse and validate a config file, then print the effective settings.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            run_serve(config).await
        }
        Command::CheckConfig { config } => {
            let config = load_config(Some(config.as_path()))?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BlobshareConfig> {
    match path {
        Some(path) => BlobshareConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(BlobshareConfig::default()),
    }
}

async fn run_serve(config: BlobshareConfig) -> anyhow::Result<()> {
    info!("blobshare daemon starting");

    let data_dir = &config.server.data_dir;
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("blobshare.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let validator = Arc::new(LedgerValidator::from_config(&config.validator));
    info!(
        identities = config.validator.balances.len(),
        trust_signatures = config.validator.trust_signatures,
        "ledger validator initialized"
    );

    let transport = Arc::new(FileTransport::new(data_dir.join("batches"))?);
    info!(dir = ?transport.dir(), "file transport initialized");

    let retry = RetryPolicy::from(&config.retry);
    let pipeline = AdmissionPipeline::new(store, config.scheduler.clone(), validator, transport, retry)?;
    info!(
        capacity_kb = config.scheduler.capacity_kb,
        flush_threshold_kb = config.scheduler.flush_threshold_kb,
        "admission pipeline initialized"
    );

    // ── Start API server ───────────────────────────────────────

    let router = blobshare_api::build_router(Arc::new(pipeline));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to install CTRL+C handler");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("blobshare daemon stopped");
    Ok(())
}
