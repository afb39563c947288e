//! SQLite-based row store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use folio_core::{DataError, Result, RowStore, SeriesPoint, StoreSummary, Symbol};
use rusqlite::{Connection, params, params_from_iter, types::Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// SQLite-backed series table.
///
/// Dates are stored as ISO `YYYY-MM-DD` text and timestamps as RFC 3339 UTC
/// text, so both order correctly as strings. Every statement is parameterized.
#[derive(Debug)]
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> DataError {
    DataError::Store(e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DataError::Store(format!("Invalid stored date {s:?}: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DataError::Store(format!("Invalid stored timestamp {s:?}: {e}")))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

type RawRow = (String, String, f64, f64, f64, f64, String);

/// Reads `symbol, date, open, high, low, close, last_updated` in that order.
fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn into_point((symbol, date, open, high, low, close, last_updated): RawRow) -> Result<SeriesPoint> {
    Ok(
        SeriesPoint::new(Symbol::new(symbol), parse_date(&date)?, open, high, low, close)
            .with_last_updated(parse_timestamp(&last_updated)?),
    )
}

impl SqliteRowStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(store_err)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(store_err)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS series (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )
        .map_err(store_err)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_series_last_updated ON series(last_updated)",
            [],
        )
        .map_err(store_err)?;

        debug!("SQLite series schema initialized");
        Ok(())
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn max_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>> {
        let conn = self.lock()?;
        let max: Option<String> = conn
            .query_row(
                "SELECT MAX(date) FROM series WHERE symbol = ?1",
                params![symbol.as_str()],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        max.as_deref().map(parse_date).transpose()
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn upsert(&self, rows: &[SeriesPoint]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(store_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO series
                     (symbol, date, open, high, low, close, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(store_err)?;
            for row in rows {
                stmt.execute(params![
                    row.symbol.as_str(),
                    row.date.to_string(),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    format_timestamp(row.last_updated),
                ])
                .map_err(store_err)?;
            }
        }
        tx.commit().map_err(store_err)?;

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
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; symbols.len()].join(", ");
        let sql = format!(
            "SELECT symbol, date, open, high, low, close, last_updated
             FROM series
             WHERE symbol IN ({placeholders}) AND date >= ? AND date <= ?
             ORDER BY symbol ASC, date ASC"
        );
        let bindings: Vec<Value> = symbols
            .iter()
            .map(|s| Value::Text(s.as_str().to_string()))
            .chain([Value::Text(start.to_string()), Value::Text(end.to_string())])
            .collect();

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let raw = stmt
            .query_map(params_from_iter(bindings), read_row)
            .map_err(store_err)?;

        let mut points = Vec::new();
        for row in raw {
            points.push(into_point(row.map_err(store_err)?)?);
        }

        debug!("Found {} series rows", points.len());
        Ok(points)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SeriesPoint>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT symbol, date, open, high, low, close, last_updated
                 FROM series
                 ORDER BY date DESC, symbol ASC
                 LIMIT ?1",
            )
            .map_err(store_err)?;
        let raw = stmt.query_map(params![limit], read_row).map_err(store_err)?;
        raw.map(|row| row.map_err(store_err).and_then(into_point))
            .collect()
    }

    async fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let max: Option<String> = conn
            .query_row("SELECT MAX(last_updated) FROM series", [], |row| row.get(0))
            .map_err(store_err)?;
        max.as_deref().map(parse_timestamp).transpose()
    }

    #[instrument(skip(self))]
    async fn summary(&self) -> Result<StoreSummary> {
        let conn = self.lock()?;
        let (total, unique, earliest, latest, updated) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT symbol), MIN(date), MAX(date), MAX(last_updated)
                 FROM series",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .map_err(store_err)?;

        Ok(StoreSummary {
            total_rows: usize::try_from(total).map_err(store_err)?,
            unique_symbols: usize::try_from(unique).map_err(store_err)?,
            earliest_date: earliest.as_deref().map(parse_date).transpose()?,
            latest_date: latest.as_deref().map(parse_date).transpose()?,
            last_updated: updated.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn point(symbol: &str, d: NaiveDate, close: f64) -> SeriesPoint {
        SeriesPoint::new(Symbol::new(symbol), d, close - 1.0, close + 1.0, close - 2.0, close)
            .with_last_updated(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_sqlite_store_initialization() {
        let store = SqliteRowStore::in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let store = SqliteRowStore::in_memory().unwrap();
        let rows = vec![
            point("MSFT", date(2024, 1, 5), 370.0),
            point("AAPL", date(2024, 1, 12), 186.0),
            point("AAPL", date(2024, 1, 5), 181.0),
        ];
        assert_eq!(store.upsert(&rows).await.unwrap(), 3);

        let out = store
            .query(
                &[Symbol::new("AAPL"), Symbol::new("MSFT")],
                date(2024, 1, 1),
                date(2024, 1, 31),
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].symbol.as_str(), "AAPL");
        assert_eq!(out[0].date, date(2024, 1, 5));
        assert_eq!(out[1].date, date(2024, 1, 12));
        assert_eq!(out[2].symbol.as_str(), "MSFT");
        assert_eq!(out[0], rows[2]);
    }

    #[tokio::test]
    async fn test_upsert_same_key_replaces_row() {
        let store = SqliteRowStore::in_memory().unwrap();
        store.upsert(&[point("AAPL", date(2024, 1, 5), 181.0)]).await.unwrap();
        store.upsert(&[point("AAPL", date(2024, 1, 5), 185.5)]).await.unwrap();

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.total_rows, 1);

        let out = store
            .query(&[Symbol::new("AAPL")], date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        assert_eq!(out[0].close, 185.5);
    }

    #[tokio::test]
    async fn test_max_date_and_last_updated() {
        let store = SqliteRowStore::in_memory().unwrap();
        assert_eq!(store.max_date(&Symbol::new("AAPL")).await.unwrap(), None);
        assert_eq!(store.last_updated().await.unwrap(), None);

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        store
            .upsert(&[
                point("AAPL", date(2024, 1, 5), 181.0),
                point("AAPL", date(2024, 1, 12), 186.0).with_last_updated(later),
                point("MSFT", date(2024, 2, 2), 400.0),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.max_date(&Symbol::new("AAPL")).await.unwrap(),
            Some(date(2024, 1, 12))
        );
        assert_eq!(store.last_updated().await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn test_summary() {
        let store = SqliteRowStore::in_memory().unwrap();
        assert_eq!(store.summary().await.unwrap(), StoreSummary::default());

        store
            .upsert(&[
                point("AAPL", date(2024, 1, 5), 181.0),
                point("AAPL", date(2024, 1, 12), 186.0),
                point("MSFT", date(2024, 2, 2), 400.0),
            ])
            .await
            .unwrap();
        let summary = store.summary().await.unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.unique_symbols, 2);
        assert_eq!(summary.earliest_date, Some(date(2024, 1, 5)));
        assert_eq!(summary.latest_date, Some(date(2024, 2, 2)));
    }

    #[tokio::test]
    async fn test_query_treats_symbols_as_data() {
        let store = SqliteRowStore::in_memory().unwrap();
        store.upsert(&[point("AAPL", date(2024, 1, 5), 181.0)]).await.unwrap();

        let out = store
            .query(
                &[Symbol::new("x' OR '1'='1")],
                date(2000, 1, 1),
                date(2100, 1, 1),
            )
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(store.summary().await.unwrap().total_rows, 1);
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("market.db");

        {
            let store = SqliteRowStore::open(&path).unwrap();
            store.upsert(&[point("AAPL", date(2024, 1, 5), 181.0)]).await.unwrap();
        }

        let store = SqliteRowStore::open(&path).unwrap();
        assert_eq!(
            store.max_date(&Symbol::new("AAPL")).await.unwrap(),
            Some(date(2024, 1, 5))
        );
    }

    #[tokio::test]
    async fn test_recent_newest_first() {
        let store = SqliteRowStore::in_memory().unwrap();
        store
            .upsert(&[
                point("MSFT", date(2024, 1, 12), 390.0),
                point("AAPL", date(2024, 1, 5), 181.0),
                point("AAPL", date(2024, 1, 12), 185.0),
            ])
            .await
            .unwrap();

        let recent = store.recent(2).await.unwrap();
        let keys: Vec<(&str, NaiveDate)> =
            recent.iter().map(|r| (r.symbol.as_str(), r.date)).collect();
        assert_eq!(
            keys,
            vec![("AAPL", date(2024, 1, 12)), ("MSFT", date(2024, 1, 12))]
        );
        assert_eq!(store.recent(10).await.unwrap().len(), 3);
    }
}
