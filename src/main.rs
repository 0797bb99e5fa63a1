use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use gator::config::parse_interval;
use gator::{Aggregator, Config, CycleErrorPolicy, Database, GatorError, RssFetcher};

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Personal RSS feed aggregator")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll registered feeds until interrupted
    Agg {
        /// Time between polls, e.g. 30s, 1m, 1h30m
        #[arg(value_parser = parse_interval_arg)]
        interval: Option<Duration>,

        /// Log failed cycles and keep polling instead of exiting
        #[arg(long)]
        keep_going: bool,
    },
}

fn parse_interval_arg(s: &str) -> Result<Duration, String> {
    parse_interval(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = gator::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gator::logging::init_console_only(&config.logging.level);
    }

    match args.command {
        Command::Agg {
            interval,
            keep_going,
        } => match run_agg(&config, interval, keep_going).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Aggregator exited");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_agg(
    config: &Config,
    interval: Option<Duration>,
    keep_going: bool,
) -> gator::Result<()> {
    let db = Arc::new(Database::open(&config.database.path).await?);
    let fetcher =
        RssFetcher::new(&config.fetcher).map_err(|e| GatorError::Config(e.to_string()))?;

    let mut aggregator = Aggregator::new(db.clone(), Arc::new(fetcher), &config.aggregator);
    if let Some(interval) = interval {
        aggregator = aggregator.with_interval(interval);
    }
    if keep_going {
        aggregator = aggregator.with_error_policy(CycleErrorPolicy::Continue);
    }

    info!("Collecting feeds every {:?}", aggregator.interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would stop the aggregator
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    });

    let result = aggregator.run(shutdown_rx).await;
    db.close().await;
    result
}
