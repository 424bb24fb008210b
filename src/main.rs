use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travel_monitor::config::{Config, WorkerConfig};
use travel_monitor::coordinator::{run_console, Coordinator};
use travel_monitor::error::{Error, Result};
use travel_monitor::worker::run_worker;

#[derive(Parser)]
#[command(
    name = "travel-monitor",
    version,
    about = "Partitioned vaccination-record service for travel requests",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator and its workers, then accept commands on stdin
    Coordinator {
        /// Number of worker processes
        #[arg(short = 'm', long)]
        workers: Option<usize>,

        /// Chunk size in bytes for framed messages
        #[arg(short = 'b', long)]
        chunk_size: Option<usize>,

        /// Capacity of each worker's file queue
        #[arg(short = 'c', long)]
        queue_capacity: Option<usize>,

        /// Membership filter size in bytes
        #[arg(short = 's', long)]
        filter_bytes: Option<usize>,

        /// Directory with one sub-directory per country
        #[arg(short = 'i', long)]
        input_dir: Option<PathBuf>,

        /// Import threads per worker
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Seconds allowed for connecting to all workers
        #[arg(long)]
        timeout: Option<u64>,

        /// Directory receiving log files
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Do not replace workers that exit unexpectedly
        #[arg(long)]
        no_revive: bool,
    },

    /// Run as a worker (started by the coordinator)
    #[command(hide = true)]
    Worker {
        /// JSON-encoded worker configuration
        #[arg(long)]
        config: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, category = e.category().description(), "Fatal error");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Worker { config } => {
            let config = WorkerConfig::from_arg(&config).map_err(config_error)?;
            setup_tracing(&config.logging.format, &config.logging.level)?;
            run_worker(config).await
        }

        Commands::Coordinator {
            workers,
            chunk_size,
            queue_capacity,
            filter_bytes,
            input_dir,
            threads,
            timeout,
            log_dir,
            config,
            no_revive,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path).map_err(config_error)?,
                None => Config::default(),
            };
            config.apply_env();

            if let Some(v) = workers {
                config.coordinator.num_workers = v;
            }
            if let Some(v) = chunk_size {
                config.transport.chunk_size = v;
            }
            if let Some(v) = queue_capacity {
                config.import.queue_capacity = v;
            }
            if let Some(v) = filter_bytes {
                config.import.filter_bytes = v;
            }
            if let Some(v) = input_dir {
                config.coordinator.input_dir = v;
            }
            if let Some(v) = threads {
                config.import.threads = v;
            }
            if let Some(v) = timeout {
                config.coordinator.connect_timeout_secs = v;
            }
            if let Some(v) = log_dir {
                config.coordinator.log_dir = v;
            }
            if no_revive {
                config.coordinator.revive_workers = false;
            }
            if cli.verbose {
                config.logging.level = String::from("debug");
            }
            config.logging.format = cli.log_format;

            setup_tracing(&config.logging.format, &config.logging.level)?;
            config.validate().map_err(config_error)?;

            tracing::info!(
                workers = config.coordinator.num_workers,
                input_dir = %config.coordinator.input_dir.display(),
                chunk_size = config.transport.chunk_size,
                "Travel monitor starting"
            );

            let coordinator = Coordinator::start(config).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let log_file = run_console(coordinator, stdin).await?;
            tracing::info!(path = %log_file.display(), "Travel monitor completed");
            Ok(())
        }
    }
}

fn config_error(err: anyhow::Error) -> Error {
    Error::config(format!("{err:#}"))
}

fn setup_tracing(format: &str, level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("travel_monitor={level},warn"))
        .map_err(|e| Error::config(format!("invalid log level {level}: {e}")))?;

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
        }
    }
    .map_err(|e| Error::with_source("failed to initialize logging", e))
}
