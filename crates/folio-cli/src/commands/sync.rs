//! `folio sync`: incremental series sync into the SQLite store.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use folio::{
    Granularity, IncrementalSeriesSync, MarketData, RefreshSchedule, RowStore, Settings,
    MAX_LOOKBACK_YEARS, SqliteRowStore, Symbol, SymbolOutcome, SyncConfig, SyncReport,
    YahooProvider,
};
use tracing::{info, warn};

#[derive(Debug, Args)]
pub(crate) struct SyncArgs {
    /// Comma separated tickers (default: FOLIO_TICKERS or the built-in list)
    pub(crate) tickers: Option<String>,

    /// Years of history to fetch for symbols with no rows yet (at most 200)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_LOOKBACK_YEARS)))]
    pub(crate) years: Option<u32>,

    /// Bar size: daily, weekly or monthly
    #[arg(short, long)]
    pub(crate) granularity: Option<Granularity>,

    /// Symbols synced at once
    #[arg(short, long, default_value = "1")]
    pub(crate) concurrency: usize,

    /// SQLite database path (default: FOLIO_DB_PATH or folio.db)
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,

    /// Skip the run unless the weekly Friday 17:00 US/Eastern refresh was missed
    #[arg(long)]
    pub(crate) if_due: bool,
}

impl SyncArgs {
    fn tickers(&self, settings: &Settings) -> Result<Vec<Symbol>> {
        let tickers = match &self.tickers {
            Some(list) => Symbol::parse_list(list),
            None => settings.tickers.clone(),
        };
        if tickers.is_empty() {
            bail!("No tickers to sync");
        }
        Ok(tickers)
    }

    fn config(&self, settings: &Settings) -> SyncConfig {
        let mut config = settings.sync.clone().with_concurrency(self.concurrency);
        if let Some(years) = self.years {
            config = config.with_lookback_years(years);
        }
        if let Some(granularity) = self.granularity {
            config = config.with_granularity(granularity);
        }
        config
    }
}

pub(crate) async fn run(args: SyncArgs, settings: &Settings) -> Result<ExitCode> {
    let tickers = args.tickers(settings)?;
    let config = args.config(settings);
    let db = args.db.clone().unwrap_or_else(|| settings.db_path.clone());

    let store: Arc<dyn RowStore> = Arc::new(
        SqliteRowStore::open(&db).with_context(|| format!("Failed to open {}", db.display()))?,
    );

    if args.if_due {
        let schedule = RefreshSchedule::default();
        let now = Utc::now();
        let last_updated = store.last_updated().await?;
        if !schedule.is_due(now, last_updated) {
            info!(
                last_updated = ?last_updated,
                last_trigger = %schedule.last_trigger_before(now),
                "Store is up to date, skipping sync"
            );
            println!("Up to date, nothing to sync.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    info!(
        symbols = tickers.len(),
        granularity = %config.granularity,
        db = %db.display(),
        "Starting sync"
    );

    let provider = YahooProvider::new().context("Failed to build Yahoo Finance client")?;
    let sync = IncrementalSeriesSync::new(store.clone())
        .with_provider(Arc::new(provider))
        .with_config(config);
    let report = sync.run(&tickers).await.context("Sync could not start")?;

    if report.rows_written > 0 {
        let market = MarketData::new(Arc::new(settings.open_cache()), store);
        market.invalidate_series();
    }

    print_report(&report);

    if report.all_failed() {
        warn!("Every symbol failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &SyncReport) {
    println!();
    for (symbol, outcome) in &report.outcomes {
        let marker = match outcome {
            SymbolOutcome::Done { .. } => "ok",
            SymbolOutcome::Skipped { .. } => "--",
            SymbolOutcome::Failed { .. } => "!!",
        };
        println!("  {marker} {symbol:<8} {outcome}");
    }
    println!();
    println!(
        "Synced {} of {} symbols ({} skipped, {} failed), {} rows written",
        report.succeeded,
        report.total(),
        report.skipped,
        report.failed,
        report.rows_written
    );

    let failed: Vec<&str> = report.failed_symbols().map(Symbol::as_str).collect();
    if !failed.is_empty() {
        println!("Failed: {}", failed.join(", "));
    }
    let retryable: Vec<&str> = report.retryable_symbols().map(Symbol::as_str).collect();
    if !retryable.is_empty() {
        println!("Worth retrying later: {}", retryable.join(", "));
    }
}
