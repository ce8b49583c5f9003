//! reqfile: run the HTTP requests described in a text file.
//!
//! # Architecture Overview
//!
//! ```text
//!     request file ──▶ parser ──▶ RequestRecords
//!                                      │
//!                                      ▼
//!                                 dispatcher ──▶ resolver ──▶ executor ──▶ server
//!                                      │                          │
//!                                      ▼                          ▼
//!                                   stdout  ◀──────────────── render
//!
//!     watch mode:  notify ──▶ debounce ──▶ stability filter ──▶ dispatcher
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use reqfile::config::load_or_default;
use reqfile::lifecycle::signals::spawn_ctrl_c_handler;
use reqfile::observability::{logging, metrics};
use reqfile::{watch, Dispatcher, Shutdown};

#[derive(Parser)]
#[command(name = "reqfile")]
#[command(about = "Execute HTTP requests written in .http/.rest files", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch every request in the file once
    Run {
        file: PathBuf,
    },
    /// Re-dispatch the file each time it is saved
    Watch {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    logging::init(&config.observability.log_level);

    tracing::info!("reqfile v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let dispatcher = Dispatcher::new(&config)?;

    match cli.command {
        Commands::Run { file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let summary = dispatcher.dispatch(&content).await;
            tracing::info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                invalid = summary.invalid,
                "Run complete"
            );
            if summary.all_succeeded() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Watch { file } => {
            let shutdown = Shutdown::new();
            spawn_ctrl_c_handler(shutdown.clone());
            watch::watch_file(&file, &config.watch, &dispatcher, &shutdown).await?;
            tracing::info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}
