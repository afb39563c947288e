//! Memoized market data reads for dashboard call sites.

use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta, Utc};
use folio_cache::{CacheKey, TieredCache, TtlPolicy};
use folio_core::{
    DataError, Quote, RemoteFundamentalsProvider, RemoteQuoteProvider, Result, RowStore,
    SeriesPoint, Symbol,
};
use polars::prelude::DataFrame;
use tracing::{debug, instrument};

use crate::records::FrameRecords;

const KEY_PREFIX: &str = "md";

/// Quotes, fundamentals and stored series behind one [`TieredCache`].
///
/// Every read is memoized under the TTL its call site gets from the
/// [`TtlPolicy`]. Quotes stay in memory only; portfolio quotes, fundamentals
/// and series reads are persist-hinted and reach the disk snapshot when their
/// TTL is above the cache's persistence threshold.
///
/// # Example
///
/// ```rust,ignore
/// let market = MarketData::new(cache, store).with_yahoo()?;
/// let fundamentals = market.fundamentals(&[Symbol::new("AAPL")]).await?;
/// ```
pub struct MarketData {
    cache: Arc<TieredCache>,
    store: Arc<dyn RowStore>,
    quotes: Option<Arc<dyn RemoteQuoteProvider>>,
    fundamentals: Option<Arc<dyn RemoteFundamentalsProvider>>,
    ttl: TtlPolicy,
}

impl std::fmt::Debug for MarketData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketData")
            .field("cache", &self.cache.stats().location)
            .field("store", &self.store)
            .field("quotes", &self.quotes.as_ref().map(|p| p.name()))
            .field("fundamentals", &self.fundamentals.as_ref().map(|p| p.name()))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MarketData {
    /// Creates a service with no remote providers and the default TTLs.
    pub fn new(cache: Arc<TieredCache>, store: Arc<dyn RowStore>) -> Self {
        Self {
            cache,
            store,
            quotes: None,
            fundamentals: None,
            ttl: TtlPolicy::default(),
        }
    }

    /// Sets the quote provider.
    #[must_use]
    pub fn with_quote_provider(mut self, provider: Arc<dyn RemoteQuoteProvider>) -> Self {
        self.quotes = Some(provider);
        self
    }

    /// Sets the fundamentals provider.
    #[must_use]
    pub fn with_fundamentals_provider(
        mut self,
        provider: Arc<dyn RemoteFundamentalsProvider>,
    ) -> Self {
        self.fundamentals = Some(provider);
        self
    }

    /// Replaces the TTL policy.
    #[must_use]
    pub const fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    /// Uses one Yahoo Finance client for both quotes and fundamentals.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    #[cfg(feature = "yahoo")]
    pub fn with_yahoo(self) -> Result<Self> {
        let yahoo = Arc::new(folio_yahoo::YahooProvider::new()?);
        Ok(self
            .with_quote_provider(yahoo.clone())
            .with_fundamentals_provider(yahoo))
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// The row store series reads come from.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// The TTLs in use.
    #[must_use]
    pub const fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    fn quote_provider(&self) -> Result<&Arc<dyn RemoteQuoteProvider>> {
        self.quotes
            .as_ref()
            .ok_or_else(|| DataError::ProviderNotConfigured("quote".to_string()))
    }

    /// Current quote for `symbol`, cached for the `quotes` TTL in memory only.
    ///
    /// # Errors
    /// Returns [`DataError::ProviderNotConfigured`] without a quote provider,
    /// or the provider's error on a cache miss.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote> {
        let provider = self.quote_provider()?;
        let key = CacheKey::new("quote").prefix(KEY_PREFIX).arg(symbol);
        self.cache
            .memoize(&key, self.ttl.quotes, false, move || provider.fetch_quote(symbol))
            .await
    }

    /// Quotes for every symbol in `symbols`, in input order, cached as one
    /// entry for the `portfolio_summary` TTL.
    ///
    /// Individual quotes go through [`quote`](Self::quote), so a summary miss
    /// still reuses fresh per-symbol entries.
    ///
    /// # Errors
    /// Fails with the first quote error; nothing is cached in that case.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn portfolio_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>> {
        self.quote_provider()?;
        let key = CacheKey::new("portfolio_quotes")
            .prefix(KEY_PREFIX)
            .arg(symbols);
        self.cache
            .memoize(&key, self.ttl.portfolio_summary, true, || async move {
                let mut quotes = Vec::with_capacity(symbols.len());
                for symbol in symbols {
                    quotes.push(self.quote(symbol).await?);
                }
                Ok::<_, DataError>(quotes)
            })
            .await
    }

    /// Fundamentals for `symbols`, one row per symbol found.
    ///
    /// Cached for the `fundamentals` TTL with a persist hint. `None` means the
    /// provider had nothing for any of the symbols; that answer is cached too.
    /// A cached frame keeps its column types, except that integer and float
    /// columns come back as Int64 and Float64.
    ///
    /// # Errors
    /// Returns [`DataError::ProviderNotConfigured`] without a fundamentals
    /// provider, or the provider's error on a cache miss.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn fundamentals(&self, symbols: &[Symbol]) -> Result<Option<DataFrame>> {
        let provider = self
            .fundamentals
            .as_ref()
            .ok_or_else(|| DataError::ProviderNotConfigured("fundamentals".to_string()))?;
        let key = CacheKey::new("fundamentals")
            .prefix(KEY_PREFIX)
            .arg(symbols);

        let records = self
            .cache
            .memoize(&key, self.ttl.fundamentals, true, || async move {
                let frame = provider.fetch_fundamentals(symbols).await?;
                if frame.height() == 0 {
                    debug!(provider = provider.name(), "No fundamentals returned");
                    return Ok::<_, DataError>(None);
                }
                FrameRecords::from_frame(&frame).map(Some)
            })
            .await?;
        records.map(FrameRecords::into_frame).transpose()
    }

    /// Stored rows for `symbols` over the last `years` years (365 days
    /// each), ordered by symbol then date. A span reaching past the calendar
    /// range reads from [`NaiveDate::MIN`].
    ///
    /// Cached for the `series` TTL with a persist hint. Call
    /// [`invalidate_series`](Self::invalidate_series) after a sync writes
    /// new rows.
    ///
    /// # Errors
    /// Returns the store's error on a cache miss.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn series(&self, symbols: &[Symbol], years: u32) -> Result<Vec<SeriesPoint>> {
        let end = Utc::now().date_naive();
        let start = end
            .checked_sub_signed(TimeDelta::days(365 * i64::from(years)))
            .unwrap_or(NaiveDate::MIN);
        let key = CacheKey::new("series")
            .prefix(KEY_PREFIX)
            .arg(symbols)
            .arg(&years)
            .arg(&end);

        self.cache
            .memoize(&key, self.ttl.series, true, move || {
                self.store.query(symbols, start, end)
            })
            .await
    }

    /// Drops every cached series read, returning how many entries went.
    pub fn invalidate_series(&self) -> usize {
        let removed = self.cache.delete_prefix(&format!("{KEY_PREFIX}:series:"));
        debug!(removed, "Invalidated cached series reads");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_cache::CacheConfig;
    use folio_core::DataProvider;
    use folio_store::InMemoryRowStore;
    use polars::prelude::{Column, DataType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct StubProvider {
        quote_calls: AtomicUsize,
        fundamentals_calls: AtomicUsize,
        empty: bool,
    }

    impl DataProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn description(&self) -> &str {
            "Counts calls"
        }
    }

    #[async_trait]
    impl RemoteQuoteProvider for StubProvider {
        async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if symbol.as_str() == "FAIL" {
                return Err(DataError::SymbolNotFound(symbol.to_string()));
            }
            Ok(Quote::new(symbol.clone(), 101.0, Quote::change_from(101.0, 100.0)))
        }
    }

    #[async_trait]
    impl RemoteFundamentalsProvider for StubProvider {
        async fn fetch_fundamentals(&self, symbols: &[Symbol]) -> Result<DataFrame> {
            self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(DataFrame::empty());
            }
            let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
            let caps: Vec<i64> = (1..=symbols.len() as i64).map(|i| i * 1_000).collect();
            Ok(DataFrame::new(vec![
                Column::new("symbol".into(), names),
                Column::new("market_cap".into(), caps),
            ])?)
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn service(provider: &Arc<StubProvider>, store: Arc<InMemoryRowStore>) -> MarketData {
        MarketData::new(Arc::new(TieredCache::in_memory()), store)
            .with_quote_provider(provider.clone())
            .with_fundamentals_provider(provider.clone())
    }

    #[tokio::test]
    async fn test_quote_memoized() {
        let provider = Arc::new(StubProvider::default());
        let market = service(&provider, Arc::new(InMemoryRowStore::new()));
        let aapl = Symbol::new("AAPL");

        let first = market.quote(&aapl).await.unwrap();
        let second = market.quote(&aapl).await.unwrap();
        assert_eq!(first, second);
        assert!((first.change_percent - 1.0).abs() < 1e-9);
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 1);

        market.quote(&Symbol::new("MSFT")).await.unwrap();
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_quote_errors_not_cached() {
        let provider = Arc::new(StubProvider::default());
        let market = service(&provider, Arc::new(InMemoryRowStore::new()));
        let fail = Symbol::new("FAIL");

        assert!(market.quote(&fail).await.is_err());
        assert!(market.quote(&fail).await.is_err());
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_providers() {
        let market = MarketData::new(
            Arc::new(TieredCache::in_memory()),
            Arc::new(InMemoryRowStore::new()),
        );
        let symbols = [Symbol::new("AAPL")];
        assert!(matches!(
            market.quote(&symbols[0]).await,
            Err(DataError::ProviderNotConfigured(_))
        ));
        assert!(matches!(
            market.portfolio_quotes(&symbols).await,
            Err(DataError::ProviderNotConfigured(_))
        ));
        assert!(matches!(
            market.fundamentals(&symbols).await,
            Err(DataError::ProviderNotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_portfolio_quotes_reuse_symbol_entries() {
        let provider = Arc::new(StubProvider::default());
        let market = service(&provider, Arc::new(InMemoryRowStore::new()));
        let symbols = [Symbol::new("AAPL"), Symbol::new("MSFT")];

        market.quote(&symbols[0]).await.unwrap();
        let quotes = market.portfolio_quotes(&symbols).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[1].symbol, symbols[1]);
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 2);

        market.portfolio_quotes(&symbols).await.unwrap();
        assert_eq!(provider.quote_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fundamentals_cached_as_frame() {
        let provider = Arc::new(StubProvider::default());
        let market = service(&provider, Arc::new(InMemoryRowStore::new()));
        let symbols = [Symbol::new("AAPL"), Symbol::new("MSFT")];

        let frame = market.fundamentals(&symbols).await.unwrap().unwrap();
        let cached = market.fundamentals(&symbols).await.unwrap().unwrap();
        assert_eq!(provider.fundamentals_calls.load(Ordering::SeqCst), 1);
        assert_eq!(frame.shape(), (2, 2));
        assert!(cached.equals(&frame));
        assert_eq!(cached.column("market_cap").unwrap().dtype(), &DataType::Int64);
    }

    #[tokio::test]
    async fn test_empty_fundamentals_cached_as_none() {
        let provider = Arc::new(StubProvider {
            empty: true,
            ..StubProvider::default()
        });
        let market = service(&provider, Arc::new(InMemoryRowStore::new()));
        let symbols = [Symbol::new("ZZZZ")];

        assert!(market.fundamentals(&symbols).await.unwrap().is_none());
        assert!(market.fundamentals(&symbols).await.unwrap().is_none());
        assert_eq!(provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fundamentals_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::default().with_dir(dir.path());
        let symbols = [Symbol::new("AAPL")];

        let provider = Arc::new(StubProvider::default());
        let market = MarketData::new(
            Arc::new(TieredCache::open(config.clone())),
            Arc::new(InMemoryRowStore::new()),
        )
        .with_fundamentals_provider(provider.clone());
        market.fundamentals(&symbols).await.unwrap();

        let reopened = MarketData::new(
            Arc::new(TieredCache::open(config)),
            Arc::new(InMemoryRowStore::new()),
        )
        .with_fundamentals_provider(provider.clone());
        let frame = reopened.fundamentals(&symbols).await.unwrap().unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_series_reads_store_until_invalidated() {
        let store = Arc::new(InMemoryRowStore::new());
        let market = service(&Arc::new(StubProvider::default()), store.clone());
        let aapl = Symbol::new("AAPL");
        let recent = Utc::now().date_naive() - TimeDelta::days(7);

        store
            .upsert(&[
                SeriesPoint::new(aapl.clone(), recent, 1.0, 2.0, 0.5, 1.5),
                SeriesPoint::new(aapl.clone(), day(1, 5) - TimeDelta::days(365 * 20), 1.0, 1.0, 1.0, 1.0),
            ])
            .await
            .unwrap();

        let rows = market.series(&[aapl.clone()], 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, recent);

        let newer = recent + TimeDelta::days(1);
        store
            .upsert(&[SeriesPoint::new(aapl.clone(), newer, 1.0, 2.0, 0.5, 1.5)])
            .await
            .unwrap();
        assert_eq!(market.series(&[aapl.clone()], 10).await.unwrap().len(), 1);

        assert_eq!(market.invalidate_series(), 1);
        assert_eq!(market.series(&[aapl], 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_series_with_huge_span_reads_everything() {
        let store = Arc::new(InMemoryRowStore::new());
        let market = service(&Arc::new(StubProvider::default()), store.clone());
        let aapl = Symbol::new("AAPL");
        store
            .upsert(&[
                SeriesPoint::new(aapl.clone(), day(1, 5), 1.0, 1.0, 1.0, 1.0),
                SeriesPoint::new(aapl.clone(), day(1, 5) - TimeDelta::days(365 * 80), 1.0, 1.0, 1.0, 1.0),
            ])
            .await
            .unwrap();

        assert_eq!(market.series(&[aapl.clone()], 300_000).await.unwrap().len(), 2);
        assert_eq!(market.series(&[aapl], u32::MAX).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_quote_ttl_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(TieredCache::open(CacheConfig::default().with_dir(dir.path())));
        let market = MarketData::new(cache.clone(), Arc::new(InMemoryRowStore::new()))
            .with_quote_provider(Arc::new(StubProvider::default()))
            .with_ttl_policy(TtlPolicy {
                quotes: Duration::from_secs(3600),
                ..TtlPolicy::default()
            });

        market.quote(&Symbol::new("AAPL")).await.unwrap();
        let stats = cache.stats();
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.persisted_entries, 0);
    }
}
