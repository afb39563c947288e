//! The incremental sync batch and its per-symbol state machine.

use chrono::{DateTime, Utc};
use folio_core::{DataError, FetchWindow, RemoteSeriesProvider, Result, RowStore, Symbol};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{config::SyncConfig, normalize::normalize};

/// How a single symbol's sync ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// Rows were fetched and upserted.
    Done {
        /// Number of rows written.
        rows: usize,
    },
    /// Nothing to do: already up to date, or the provider had no data.
    Skipped {
        /// Why the symbol was skipped.
        reason: String,
    },
    /// Fetching, normalizing or writing failed. The rest of the batch carried on.
    Failed {
        /// Rendered error.
        error: String,
        /// Whether a later run may succeed (see [`DataError::is_transient`]).
        transient: bool,
    },
}

impl SymbolOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    fn failed(error: &DataError) -> Self {
        Self::Failed {
            error: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

impl fmt::Display for SymbolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done { rows } => write!(f, "{rows} rows"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Failed { error, .. } => write!(f, "failed: {error}"),
        }
    }
}

/// Result of a batch: totals plus one outcome per symbol, in input order.
///
/// `succeeded + failed + skipped` always equals `outcomes.len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Symbols that ended [`SymbolOutcome::Done`].
    pub succeeded: usize,
    /// Symbols that ended [`SymbolOutcome::Failed`].
    pub failed: usize,
    /// Symbols that ended [`SymbolOutcome::Skipped`].
    pub skipped: usize,
    /// Total rows upserted across the batch.
    pub rows_written: usize,
    /// Per-symbol outcomes.
    pub outcomes: Vec<(Symbol, SymbolOutcome)>,
}

impl SyncReport {
    fn from_outcomes(outcomes: Vec<(Symbol, SymbolOutcome)>) -> Self {
        let mut report = Self::default();
        for (_, outcome) in &outcomes {
            match outcome {
                SymbolOutcome::Done { rows } => {
                    report.succeeded += 1;
                    report.rows_written += rows;
                }
                SymbolOutcome::Skipped { .. } => report.skipped += 1,
                SymbolOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }

    /// Number of symbols in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Symbols whose failure may clear up on a later run, in input order.
    pub fn retryable_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Failed { transient: true, .. }))
            .map(|(s, _)| s)
    }

    /// Symbols that failed, in input order.
    pub fn failed_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Failed { .. }))
            .map(|(s, _)| s)
    }

    /// True when the batch was non-empty and nothing but failures came back.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.total() > 0 && self.failed == self.total()
    }
}

/// Brings a [`RowStore`] up to date from a [`RemoteSeriesProvider`], fetching
/// only the range after each symbol's latest persisted date.
#[derive(Debug)]
pub struct IncrementalSeriesSync {
    store: Arc<dyn RowStore>,
    provider: Option<Arc<dyn RemoteSeriesProvider>>,
    config: SyncConfig,
}

impl IncrementalSeriesSync {
    /// Creates a sync over `store` with the default configuration and no provider.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            provider: None,
            config: SyncConfig::default(),
        }
    }

    /// Attaches the series provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn RemoteSeriesProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the row store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Syncs `symbols` as of now.
    ///
    /// # Errors
    /// See [`run_at`](Self::run_at).
    pub async fn run(&self, symbols: &[Symbol]) -> Result<SyncReport> {
        self.run_at(symbols, Utc::now()).await
    }

    /// Syncs `symbols` as of `now`.
    ///
    /// Symbols are deduplicated (first occurrence wins) and blanks dropped
    /// before the batch starts. Per-symbol failures are reported in the
    /// [`SyncReport`], never returned.
    ///
    /// # Errors
    /// Returns [`DataError::ProviderNotConfigured`] when no provider is
    /// attached, or [`DataError::NotSupported`] when the provider cannot
    /// serve the configured granularity.
    #[instrument(skip(self, symbols), fields(symbols = symbols.len(), granularity = %self.config.granularity))]
    pub async fn run_at(&self, symbols: &[Symbol], now: DateTime<Utc>) -> Result<SyncReport> {
        let provider = self
            .provider
            .as_deref()
            .ok_or_else(|| DataError::ProviderNotConfigured("series provider".to_string()))?;

        if !provider
            .supported_granularities()
            .contains(&self.config.granularity)
        {
            return Err(DataError::NotSupported(format!(
                "{} does not serve {} series",
                provider.name(),
                self.config.granularity
            )));
        }

        let symbols = Symbol::normalize_all(symbols.iter().cloned());
        info!(
            provider = provider.name(),
            count = symbols.len(),
            concurrency = self.config.concurrency,
            "Starting series sync"
        );

        let outcomes = if self.config.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                let outcome = self.sync_symbol(provider, &symbol, now).await;
                outcomes.push((symbol, outcome));
            }
            outcomes
        } else {
            let mut indexed: Vec<(usize, Symbol, SymbolOutcome)> =
                stream::iter(symbols.into_iter().enumerate())
                    .map(|(i, symbol)| async move {
                        let outcome = self.sync_symbol(provider, &symbol, now).await;
                        (i, symbol, outcome)
                    })
                    .buffer_unordered(self.config.concurrency)
                    .collect()
                    .await;
            indexed.sort_by_key(|(i, _, _)| *i);
            indexed.into_iter().map(|(_, s, o)| (s, o)).collect()
        };

        let report = SyncReport::from_outcomes(outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            rows_written = report.rows_written,
            "Series sync completed"
        );
        Ok(report)
    }

    async fn sync_symbol(
        &self,
        provider: &dyn RemoteSeriesProvider,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> SymbolOutcome {
        match self.try_sync_symbol(provider, symbol, now).await {
            Ok(outcome) => {
                debug!(symbol = %symbol, outcome = %outcome, "Symbol synced");
                outcome
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, transient = e.is_transient(), "Symbol sync failed");
                SymbolOutcome::failed(&e)
            }
        }
    }

    async fn try_sync_symbol(
        &self,
        provider: &dyn RemoteSeriesProvider,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> Result<SymbolOutcome> {
        let cursor = self.store.max_date(symbol).await?;

        let Some(window) = FetchWindow::compute(cursor, now, self.config.lookback) else {
            return Ok(SymbolOutcome::skipped("up to date"));
        };
        debug!(
            symbol = %symbol,
            start = %window.start,
            end = %window.end,
            days = window.days(),
            incremental = cursor.is_some(),
            "Fetching missing range"
        );

        let fetch = provider.fetch_series(symbol, window.start, window.end, self.config.granularity);
        let frame = tokio::time::timeout(self.config.fetch_timeout, fetch)
            .await
            .map_err(|_| DataError::Timeout {
                symbol: symbol.to_string(),
                after: self.config.fetch_timeout,
            })??;

        if frame.height() == 0 {
            return Ok(SymbolOutcome::skipped("no new data"));
        }

        let rows = normalize(&frame, symbol, now)?;
        if rows.is_empty() {
            return Ok(SymbolOutcome::skipped("no complete rows"));
        }

        let written = self.store.upsert(&rows).await?;
        Ok(SymbolOutcome::Done { rows: written })
    }
}
