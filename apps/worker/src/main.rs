#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use uptime_worker::alerts::build_transport;
use uptime_worker::monitoring::{HttpProber, MonitoringExecutor, MonitoringScheduler};
use uptime_worker::rotation::LogRotation;
use uptime_worker::store::{FileLogStore, FileRecordStore};
use uptime_worker::Config;

#[derive(Debug, Parser)]
#[command(name = "uptime-worker", version, about = "Probes uptime checks and rotates their logs")]
struct Cli {
    /// Path to the config file (defaults to ~/.config/uptime-worker/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the check cycle and log rotation until interrupted (default)
    Run,
    /// Run a single check cycle and exit
    CheckOnce,
    /// Rotate all active logs once and exit
    Rotate,
    /// Print the content of a compressed log archive
    Decompress {
        /// Archive id as listed in the logs directory, without `.gz.b64`
        archive_id: String,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("Failed to load configuration")?;

    logger::init_tracing(
        logger::parse_level(&config.logging.level),
        config.logging.format.parse().unwrap_or_default(),
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::CheckOnce => {
            let (executor, _) = build_worker(&config)?;
            let summary = executor.gather_all_checks().await;
            println!(
                "listed: {}, probed: {}, skipped: {}, failed: {}, alerts sent: {}",
                summary.listed, summary.probed, summary.skipped, summary.failed, summary.alerts_sent
            );
            Ok(())
        }
        Command::Rotate => {
            let (_, rotation) = build_worker(&config)?;
            let summary = rotation.rotate_all().await;
            println!(
                "rotated: {}, empty: {}, failed: {}",
                summary.rotated, summary.empty, summary.failed
            );
            Ok(())
        }
        Command::Decompress { archive_id } => {
            let (_, rotation) = build_worker(&config)?;
            let content = rotation.decompress(&archive_id).await?;
            print!("{content}");
            Ok(())
        }
        Command::ShowConfig => {
            print!("{config}");
            Ok(())
        }
    }
}

/// Wire the stores, prober and alert transport from the configuration
fn build_worker(config: &Config) -> Result<(Arc<MonitoringExecutor>, Arc<LogRotation>)> {
    let records = Arc::new(FileRecordStore::new(&config.storage.data_dir));
    let logs = Arc::new(FileLogStore::new(&config.storage.logs_dir));
    let prober = Arc::new(
        HttpProber::new(&config.prober.user_agent, config.prober.use_system_proxy)
            .context("Failed to build HTTP client")?,
    );
    let alerts = build_transport(&config.alerts).context("Failed to set up alert transport")?;

    let executor = Arc::new(MonitoringExecutor::new(records, logs.clone(), prober, alerts));
    let rotation = Arc::new(LogRotation::new(logs));

    Ok((executor, rotation))
}

async fn run(config: &Config) -> Result<()> {
    info!(env = %config.env_name, "Starting uptime worker");
    info!(
        data_dir = %config.storage.data_dir.display(),
        logs_dir = %config.storage.logs_dir.display(),
        "Using storage"
    );

    let (executor, rotation) = build_worker(config)?;
    let scheduler = MonitoringScheduler::new(
        executor,
        rotation,
        config.worker.check_interval(),
        config.worker.rotation_interval(),
    );
    let handles = scheduler.start();

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested, abandoning in-flight work");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
