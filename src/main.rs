use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sluice::config::{LoggingConfig, SluiceConfig};
use sluice::ratelimit::RateLimiter;
use sluice::replay::{replay, ReplayOptions, Trace};

#[derive(Parser, Debug)]
#[command(
    name = "sluice",
    version,
    about = "Client-side request gate for quota-limited HTTP APIs"
)]
struct Cli {
    /// Configuration file (YAML, JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter directive, overrides the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded trace through the limiter, printing one JSON line per event
    Replay {
        /// Trace file (`.json`, otherwise YAML)
        trace: PathBuf,

        /// Give up on a take after this many milliseconds
        #[arg(long)]
        take_timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SluiceConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    info!("Starting Sluice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Loaded configuration file");
    }

    match cli.command {
        Command::Replay {
            trace,
            take_timeout_ms,
        } => {
            let trace = Trace::from_file(&trace)?;
            let options = ReplayOptions {
                headers: config.headers.clone(),
                take_timeout: take_timeout_ms
                    .map(Duration::from_millis)
                    .or_else(|| config.limiter.default_take_timeout()),
            };

            let limiter = RateLimiter::with_config(config.limiter.clone());
            info!(events = trace.events.len(), "Rate limiter initialized");

            tokio::select! {
                report = replay(&limiter, &trace, &options) => {
                    for outcome in &report.outcomes {
                        println!("{}", serde_json::to_string(outcome)?);
                    }
                    info!(
                        buckets = limiter.bucket_count(),
                        total_wait_ms = report.total_wait().as_millis() as u64,
                        "Replay complete"
                    );
                }
                _ = shutdown_signal() => {
                    warn!("Replay interrupted");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}
