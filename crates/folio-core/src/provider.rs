//! Provider traits for fetching market data.
//!
//! This module defines the remote collaborators the cache and sync layers
//! consume:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`RemoteSeriesProvider`] - OHLC price history
//! - [`RemoteQuoteProvider`] - Live quote snapshots
//! - [`RemoteFundamentalsProvider`] - Slow-changing fundamentals for a symbol set

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{
    error::Result,
    granularity::Granularity,
    types::{Quote, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for OHLC price history.
#[async_trait]
pub trait RemoteSeriesProvider: DataProvider {
    /// Fetches raw OHLC rows for a single symbol, oldest first.
    ///
    /// The returned DataFrame carries at least the columns
    /// `date, open, high, low, close`; `date` may be a Date, a Datetime or an
    /// ISO-8601 string. An empty DataFrame means the provider had nothing for
    /// the requested range.
    async fn fetch_series(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<DataFrame>;

    /// Returns the granularities this provider can serve.
    fn supported_granularities(&self) -> &[Granularity] {
        &[Granularity::Daily, Granularity::Weekly, Granularity::Monthly]
    }
}

/// Provider for live quote data.
#[async_trait]
pub trait RemoteQuoteProvider: DataProvider {
    /// Fetches the current quote for a symbol.
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote>;
}

/// Provider for fundamentals across a set of symbols.
///
/// Assumed expensive and slow-changing; results are the canonical long-TTL
/// cache use case.
#[async_trait]
pub trait RemoteFundamentalsProvider: DataProvider {
    /// Fetches one row per symbol, keyed by a `symbol` column.
    ///
    /// An empty DataFrame means none of the symbols had fundamentals.
    async fn fetch_fundamentals(&self, symbols: &[Symbol]) -> Result<DataFrame>;
}
