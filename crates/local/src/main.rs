//! namebridge relay - runs two bridged ledgers in one process
//!
//! Both ledgers live in memory; the relayer moves ejections and renewal
//! syncs between them until the process is interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use service::{Config, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// namebridge relay - two bridged ledgers and the relayer between them
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file. Without one a devnet config is used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace), overrides the config
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Once the relayers are up, register a name on ledger A, move it to
    /// B and sync a renewal back
    #[arg(long, value_name = "LABEL", num_args = 0..=1, default_missing_value = "alice")]
    demo: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::devnet(),
    };

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.log_level)
        .parse()
        .unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    match &args.config {
        Some(path) => tracing::info!("Starting namebridge relay with config {}", path.display()),
        None => tracing::warn!("No config given, starting namebridge relay on a devnet"),
    }

    let state = match ServiceState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create service state: {}", e);
            std::process::exit(1);
        }
    };

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let graceful_shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl+c: {}", e);
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    };
    tokio::spawn(graceful_shutdown);

    let (relayers, handles) = state.spawn_relayers(shutdown_rx.clone());

    if let Some(label) = &args.demo {
        match service::run_demo(&state, &config, label).await {
            Ok(report) => tracing::info!(
                "demo finished: {} owns {} on {} until {}",
                report.owner,
                report.destination,
                state.ledger_b().name(),
                report.expiry
            ),
            Err(e) => tracing::error!("demo failed: {}", e),
        }
    }

    // Wait for shutdown
    let _ = shutdown_rx.clone().changed().await;

    // Wait for all handles with timeout
    let _ = tokio::time::timeout(FINAL_SHUTDOWN_TIMEOUT, futures::future::join_all(handles)).await;

    for relayer in relayers {
        let dead_letters = relayer.dead_letters();
        if !dead_letters.is_empty() {
            tracing::warn!(
                "{}: {} undelivered messages",
                relayer.route().name(),
                dead_letters.len()
            );
        }
    }

    tracing::info!("namebridge relay shutdown complete");
    Ok(())
}
