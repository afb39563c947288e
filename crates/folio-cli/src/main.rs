//! `folio` command line.
//!
//! # Usage
//!
//! ```bash
//! # Incremental weekly sync of the configured tickers
//! folio sync
//!
//! # Two symbols, daily bars, five years of history for new symbols
//! folio sync NVDA,AMD --granularity daily --years 5
//!
//! # Store and cache inspection
//! folio verify
//! folio cache stats
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio::Settings;
use tracing::debug;

mod commands;

use commands::{cache::CacheAction, sync::SyncArgs};

#[derive(Debug, Parser)]
#[command(name = "folio")]
#[command(about = "Cached market data and incremental price history sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch new OHLC rows for each ticker and upsert them into the store
    Sync(SyncArgs),

    /// Print a summary of the series table and its most recent rows
    Verify {
        /// SQLite database path (default: FOLIO_DB_PATH or folio.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Inspect or clear the tiered cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache directory (default: FOLIO_CACHE_DIR or the system temp dir)
        #[arg(long, global = true)]
        dir: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Invalid FOLIO_* environment settings")?;
    debug!(?cli, "Parsed arguments");

    match cli.command {
        Command::Sync(args) => commands::sync::run(args, &settings).await,
        Command::Verify { db } => {
            let db = db.unwrap_or_else(|| settings.db_path.clone());
            commands::verify::run(&db).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Cache { action, dir } => {
            let mut config = settings.cache.clone();
            if let Some(dir) = dir {
                config = config.with_dir(dir);
            }
            commands::cache::run(action, config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
