//! Row store trait for the persisted series table.
//!
//! This module defines the [`RowStore`] trait: a table of [`SeriesPoint`]
//! rows with `(symbol, date)` as its primary key.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Debug;

use crate::{
    error::Result,
    types::{SeriesPoint, StoreSummary, Symbol},
};

/// Persisted per-symbol time series keyed by `(symbol, date)`.
///
/// Implementations must make [`upsert`](RowStore::upsert) idempotent: writing
/// a row whose key already exists replaces it. Concurrent upserts for
/// distinct symbols must be safe.
#[async_trait]
pub trait RowStore: Send + Sync + Debug {
    /// Returns the latest persisted date for `symbol`, or `None` when the
    /// symbol has no rows.
    async fn max_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>>;

    /// Inserts or replaces `rows`, returning the number of rows written.
    async fn upsert(&self, rows: &[SeriesPoint]) -> Result<usize>;

    /// Returns the rows for `symbols` with `start <= date <= end`, ordered
    /// by symbol then date.
    async fn query(
        &self,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>>;

    /// Returns up to `limit` rows with the latest dates, newest first and
    /// by symbol within a date.
    async fn recent(&self, limit: usize) -> Result<Vec<SeriesPoint>>;

    /// Returns the most recent `last_updated` across the whole table.
    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>>;

    /// Returns row, symbol and date-range totals for the table.
    async fn summary(&self) -> Result<StoreSummary>;
}
