//! In-memory row store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use folio_core::{Result, RowStore, SeriesPoint, StoreSummary, Symbol};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Ordered in-memory series table for tests and dry runs.
///
/// Rows live in a `RwLock`-protected `BTreeMap` keyed by `(symbol, date)`,
/// so iteration is already in symbol-then-date order. Data is lost when the
/// store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    rows: RwLock<BTreeMap<(Symbol, NaiveDate), SeriesPoint>>,
}

impl InMemoryRowStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns true if the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Number of rows for one symbol.
    pub async fn count_for(&self, symbol: &Symbol) -> usize {
        self.rows
            .read()
            .await
            .keys()
            .filter(|(s, _)| s == symbol)
            .count()
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn max_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>> {
        let rows = self.rows.read().await;
        Ok(rows
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, date)| *date)
            .max())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert(&self, rows: &[SeriesPoint]) -> Result<usize> {
        let mut table = self.rows.write().await;
        for row in rows {
            table.insert((row.symbol.clone(), row.date), row.clone());
        }
        debug!("Upserted {} rows", rows.len());
        Ok(rows.len())
    }

    #[instrument(skip(self, symbols), fields(symbols = symbols.len()))]
    async fn query(
        &self,
        symbols: &[Symbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>> {
        let wanted: BTreeSet<&Symbol> = symbols.iter().collect();
        let table = self.rows.read().await;
        Ok(table
            .iter()
            .filter(|((symbol, date), _)| wanted.contains(symbol) && *date >= start && *date <= end)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SeriesPoint>> {
        let table = self.rows.read().await;
        let mut rows: Vec<&SeriesPoint> = table.values().collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(rows.into_iter().take(limit).cloned().collect())
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let table = self.rows.read().await;
        Ok(table.values().map(|row| row.last_updated).max())
    }

    async fn summary(&self) -> Result<StoreSummary> {
        let table = self.rows.read().await;
        let symbols: BTreeSet<&Symbol> = table.keys().map(|(s, _)| s).collect();
        Ok(StoreSummary {
            total_rows: table.len(),
            unique_symbols: symbols.len(),
            earliest_date: table.keys().map(|(_, d)| *d).min(),
            latest_date: table.keys().map(|(_, d)| *d).max(),
            last_updated: table.values().map(|row| row.last_updated).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn point(symbol: &str, day: u32, close: f64) -> SeriesPoint {
        SeriesPoint::new(
            Symbol::new(symbol),
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close - 1.0,
            close + 1.0,
            close - 2.0,
            close,
        )
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let store = InMemoryRowStore::new();
        store.upsert(&[point("AAPL", 5, 150.0)]).await.unwrap();
        store.upsert(&[point("AAPL", 5, 155.0)]).await.unwrap();

        assert_eq!(store.len().await, 1);
        let rows = store
            .query(&[Symbol::new("AAPL")], NaiveDate::MIN, NaiveDate::MAX)
            .await
            .unwrap();
        assert_eq!(rows[0].close, 155.0);
    }

    #[tokio::test]
    async fn test_max_date_per_symbol() {
        let store = InMemoryRowStore::new();
        assert_eq!(store.max_date(&Symbol::new("AAPL")).await.unwrap(), None);

        store
            .upsert(&[point("AAPL", 5, 1.0), point("AAPL", 12, 2.0), point("MSFT", 19, 3.0)])
            .await
            .unwrap();
        assert_eq!(
            store.max_date(&Symbol::new("AAPL")).await.unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12)
        );
    }

    #[tokio::test]
    async fn test_query_orders_and_filters() {
        let store = InMemoryRowStore::new();
        store
            .upsert(&[
                point("MSFT", 12, 3.0),
                point("AAPL", 19, 2.0),
                point("AAPL", 5, 1.0),
                point("NVDA", 5, 4.0),
            ])
            .await
            .unwrap();

        let rows = store
            .query(
                &[Symbol::new("AAPL"), Symbol::new("MSFT")],
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            )
            .await
            .unwrap();
        let keys: Vec<(&str, u32)> = rows
            .iter()
            .map(|r| (r.symbol.as_str(), chrono::Datelike::day(&r.date)))
            .collect();
        assert_eq!(keys, vec![("AAPL", 5), ("MSFT", 12)]);
    }

    #[tokio::test]
    async fn test_summary() {
        let store = InMemoryRowStore::new();
        assert_eq!(store.summary().await.unwrap(), StoreSummary::default());

        store
            .upsert(&[point("AAPL", 5, 1.0), point("AAPL", 12, 2.0), point("MSFT", 19, 3.0)])
            .await
            .unwrap();
        let summary = store.summary().await.unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.unique_symbols, 2);
        assert_eq!(summary.earliest_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(summary.latest_date, NaiveDate::from_ymd_opt(2024, 1, 19));
        assert!(summary.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_recent_limits_and_orders() {
        let store = InMemoryRowStore::new();
        store
            .upsert(&[point("MSFT", 12, 390.0), point("AAPL", 5, 181.0), point("AAPL", 12, 185.0)])
            .await
            .unwrap();

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent[0].symbol.as_str(), "AAPL");
        assert_eq!(recent[1].symbol.as_str(), "MSFT");
        assert!(recent.iter().all(|r| r.date.day() == 12));
        assert!(store.recent(0).await.unwrap().is_empty());
    }
}
