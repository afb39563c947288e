#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance data provider.
//!
//! This crate provides a Yahoo Finance provider that implements the
//! [`RemoteSeriesProvider`], [`RemoteQuoteProvider`] and
//! [`RemoteFundamentalsProvider`] traits from `folio-core`.
//!
//! # Features
//!
//! - OHLC history from the chart API (daily, weekly, monthly)
//! - Quotes from chart metadata plus the quote-summary profile
//! - Fundamentals (market cap, P/E, dividend yield, beta) from quote summary
//! - Built-in rate limiting (1 request per second by default)
//!
//! # Example
//!
//! ```no_run
//! use folio_yahoo::YahooProvider;
//! use folio_core::{Granularity, RemoteSeriesProvider, Symbol};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> folio_core::Result<()> {
//! let provider = YahooProvider::new()?;
//! let symbol = Symbol::new("AAPL");
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!
//! let df = provider.fetch_series(&symbol, start, end, Granularity::Weekly).await?;
//! println!("Fetched {} rows", df.height());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use folio_core::{
    DataError, DataProvider, Granularity, Quote, RemoteFundamentalsProvider, RemoteQuoteProvider,
    RemoteSeriesProvider, Result, Symbol,
};
use polars::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Yahoo Finance chart API base URL.
const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Quote summary modules needed for quotes and fundamentals.
const SUMMARY_MODULES: &str = "price,assetProfile,summaryDetail,defaultKeyStatistics";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Default HTTP timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const PROVIDER_NAME: &str = "Yahoo Finance";

/// Yahoo Finance data provider.
///
/// Implements [`RemoteSeriesProvider`], [`RemoteQuoteProvider`] and
/// [`RemoteFundamentalsProvider`].
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second and a 30 second
    /// HTTP timeout.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DataError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Create a new Yahoo Finance provider with a custom HTTP client.
    ///
    /// Uses the provided client for all HTTP requests. Rate limiting
    /// is still applied.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Sets the minimum delay between requests.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit_ms = u64::try_from(rate_limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    fn now_ms() -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = Self::now_ms().saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time.store(Self::now_ms(), Ordering::Relaxed);
    }

    /// Rate-limited GET that maps HTTP failures onto [`DataError`].
    async fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &Symbol) -> Result<T> {
        self.apply_rate_limit().await;
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }

    /// Yahoo interval code for a granularity.
    const fn interval(granularity: Granularity) -> &'static str {
        match granularity {
            Granularity::Daily => "1d",
            Granularity::Weekly => "1wk",
            Granularity::Monthly => "1mo",
        }
    }

    /// Build the chart API URL for a symbol and date range.
    fn build_chart_url(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> String {
        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .unwrap_or(0);

        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .unwrap_or(0);

        format!(
            "{}/{}?period1={}&period2={}&interval={}&includeAdjustedClose=true",
            CHART_API_URL,
            symbol.as_str(),
            start_ts,
            end_ts,
            Self::interval(granularity)
        )
    }

    fn build_summary_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/{}?modules={}",
            QUOTE_SUMMARY_URL,
            symbol.as_str(),
            SUMMARY_MODULES
        )
    }

    /// Fetch a chart response and surface API-level errors.
    async fn fetch_chart(&self, symbol: &Symbol, url: &str) -> Result<ChartData> {
        let chart_response: ChartResponse = self.get_json(url, symbol).await?;

        if let Some(error) = chart_response.chart.error {
            if error.code == "Not Found" {
                return Err(DataError::SymbolNotFound(symbol.to_string()));
            }
            return Err(DataError::Other(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        chart_response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
    }

    /// Fetch the quote summary modules for a symbol.
    async fn fetch_quote_summary(&self, symbol: &Symbol) -> Result<QuoteSummaryData> {
        let url = self.build_summary_url(symbol);
        let summary: QuoteSummaryResponse = self.get_json(&url, symbol).await?;

        summary
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))
    }
}

/// Parse a chart payload into an OHLC DataFrame.
///
/// A payload without timestamps yields an empty frame.
fn parse_chart_data(symbol: &Symbol, data: ChartData) -> Result<DataFrame> {
    let timestamps = data.timestamp.unwrap_or_default();

    if timestamps.is_empty() {
        debug!(symbol = %symbol, "Chart response has no rows");
        return Ok(DataFrame::empty());
    }

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Parse("Missing quote data".to_string()))?;

    let adj_close = data
        .indicators
        .adjclose
        .and_then(|ac| ac.into_iter().next())
        .map(|ac| ac.adjclose)
        .unwrap_or_default();

    let len = timestamps.len();
    let pad = |mut v: Vec<Option<f64>>| {
        v.resize(len, None);
        v
    };

    // Seconds since epoch to days since epoch, in UTC
    let dates: Vec<i32> = timestamps
        .iter()
        .map(|&ts| i32::try_from(ts.div_euclid(86_400)).unwrap_or(0))
        .collect();

    let symbols: Vec<&str> = vec![symbol.as_str(); len];
    let closes = pad(quote.close);
    let adj_closes = if adj_close.len() == len {
        adj_close
    } else {
        closes.clone()
    };
    let mut volumes = quote.volume;
    volumes.resize(len, None);

    let date_col = Column::new("date".into(), dates).cast(&DataType::Date)?;

    let df = DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        date_col,
        Column::new("open".into(), pad(quote.open)),
        Column::new("high".into(), pad(quote.high)),
        Column::new("low".into(), pad(quote.low)),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("adjusted_close".into(), adj_closes),
    ])?;

    Ok(df)
}

/// Build a quote from chart metadata and an optional quote summary.
fn build_quote(symbol: &Symbol, meta: ChartMeta, summary: Option<QuoteSummaryData>) -> Result<Quote> {
    let price = meta
        .regular_market_price
        .ok_or_else(|| DataError::DataNotAvailable {
            symbol: symbol.to_string(),
            start: "latest".to_string(),
            end: "latest".to_string(),
        })?;
    let change_percent = meta
        .chart_previous_close
        .or(meta.previous_close)
        .map_or(0.0, |prev| Quote::change_from(price, prev));

    let mut quote = Quote::new(symbol.clone(), price, change_percent);
    quote.name = meta
        .long_name
        .or(meta.short_name)
        .unwrap_or_else(|| symbol.to_string());

    if let Some(summary) = summary {
        let fields = Fundamentals::from_summary(&summary);
        if let Some(name) = fields.name {
            quote.name = name;
        }
        quote.market_cap = fields.market_cap;
        quote.pe_ratio = fields.trailing_pe;
        quote.dividend_yield = fields.dividend_yield;
        quote.beta = fields.beta;
        quote.sector = fields.sector;
        quote.industry = fields.industry;
    }

    Ok(quote)
}

/// Fundamentals fields pulled out of a quote summary.
#[derive(Debug, Default, Clone, PartialEq)]
struct Fundamentals {
    name: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    market_cap: Option<f64>,
    trailing_pe: Option<f64>,
    forward_pe: Option<f64>,
    price_to_book: Option<f64>,
    dividend_yield: Option<f64>,
    beta: Option<f64>,
}

impl Fundamentals {
    fn from_summary(summary: &QuoteSummaryData) -> Self {
        let detail = summary.summary_detail.as_ref();
        let stats = summary.default_key_statistics.as_ref();
        let profile = summary.asset_profile.as_ref();
        let raw = |v: Option<&RawValue>| v.and_then(|v| v.raw);

        Self {
            name: summary.price.as_ref().and_then(|p| p.long_name.clone()),
            sector: profile.and_then(|p| p.sector.clone()),
            industry: profile.and_then(|p| p.industry.clone()),
            market_cap: raw(detail.and_then(|d| d.market_cap.as_ref())),
            trailing_pe: raw(detail.and_then(|d| d.trailing_pe.as_ref())),
            forward_pe: raw(detail.and_then(|d| d.forward_pe.as_ref()))
                .or_else(|| raw(stats.and_then(|s| s.forward_pe.as_ref()))),
            price_to_book: raw(stats.and_then(|s| s.price_to_book.as_ref())),
            dividend_yield: raw(detail.and_then(|d| d.dividend_yield.as_ref())),
            beta: raw(detail.and_then(|d| d.beta.as_ref()))
                .or_else(|| raw(stats.and_then(|s| s.beta.as_ref()))),
        }
    }
}

/// One row per symbol with a `symbol` column.
fn fundamentals_frame(rows: &[(Symbol, Fundamentals)]) -> Result<DataFrame> {
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }

    let text = |f: fn(&Fundamentals) -> Option<String>| -> Vec<Option<String>> {
        rows.iter().map(|(_, r)| f(r)).collect()
    };
    let num = |f: fn(&Fundamentals) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(|(_, r)| f(r)).collect()
    };

    let df = DataFrame::new(vec![
        Column::new(
            "symbol".into(),
            rows.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
        ),
        Column::new("name".into(), text(|r| r.name.clone())),
        Column::new("sector".into(), text(|r| r.sector.clone())),
        Column::new("industry".into(), text(|r| r.industry.clone())),
        Column::new("market_cap".into(), num(|r| r.market_cap)),
        Column::new("trailing_pe".into(), num(|r| r.trailing_pe)),
        Column::new("forward_pe".into(), num(|r| r.forward_pe)),
        Column::new("price_to_book".into(), num(|r| r.price_to_book)),
        Column::new("dividend_yield".into(), num(|r| r.dividend_yield)),
        Column::new("beta".into(), num(|r| r.beta)),
    ])?;

    Ok(df)
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn description(&self) -> &str {
        "Yahoo Finance provider for OHLC history, quotes and fundamentals"
    }
}

#[async_trait]
impl RemoteSeriesProvider for YahooProvider {
    #[instrument(skip(self), fields(symbol = %symbol, %granularity))]
    async fn fetch_series(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<DataFrame> {
        if start > end {
            return Err(DataError::InvalidParameter(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        let url = self.build_chart_url(symbol, start, end, granularity);
        let data = self.fetch_chart(symbol, &url).await?;
        parse_chart_data(symbol, data)
    }
}

#[async_trait]
impl RemoteQuoteProvider for YahooProvider {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote> {
        let url = format!(
            "{}/{}?range=5d&interval=1d",
            CHART_API_URL,
            symbol.as_str()
        );
        let meta = self.fetch_chart(symbol, &url).await?.meta.unwrap_or_default();

        // Profile fields are best effort; the price alone is still a quote.
        let summary = match self.fetch_quote_summary(symbol).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Quote summary unavailable");
                None
            }
        };

        build_quote(symbol, meta, summary)
    }
}

#[async_trait]
impl RemoteFundamentalsProvider for YahooProvider {
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn fetch_fundamentals(&self, symbols: &[Symbol]) -> Result<DataFrame> {
        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.fetch_quote_summary(symbol).await {
                Ok(summary) => rows.push((symbol.clone(), Fundamentals::from_summary(&summary))),
                Err(DataError::SymbolNotFound(_)) => {
                    warn!(symbol = %symbol, "No fundamentals, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Fetched fundamentals for {} symbols", rows.len());
        fundamentals_frame(&rows)
    }
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

/// Quote Summary API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryData {
    price: Option<PriceModule>,
    asset_profile: Option<AssetProfile>,
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
}

/// Yahoo wraps numbers as `{"raw": 28.5, "fmt": "28.50"}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    market_cap: Option<RawValue>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    price_to_book: Option<RawValue>,
    beta: Option<RawValue>,
}
