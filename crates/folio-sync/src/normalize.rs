//! Reshapes a provider frame into persisted series rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use folio_core::{DataError, Result, SeriesPoint, Symbol};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

const OHLC: [&str; 4] = ["open", "high", "low", "close"];

fn column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column> {
    frame
        .column(name)
        .map_err(|_| DataError::Parse(format!("Provider frame is missing column '{name}'")))
}

fn epoch_day(days: i32) -> Option<NaiveDate> {
    DateTime::<Utc>::UNIX_EPOCH
        .date_naive()
        .checked_add_signed(TimeDelta::days(i64::from(days)))
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc).date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Converts the `date` column to calendar dates, one per row.
///
/// Date columns are read as-is, Datetime columns are truncated to their
/// date, and string columns are parsed as ISO dates or timestamps.
fn dates(frame: &DataFrame) -> Result<Vec<Option<NaiveDate>>> {
    let col = column(frame, "date")?;
    match col.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let days = col.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            Ok(days.i32()?.iter().map(|d| d.and_then(epoch_day)).collect())
        }
        DataType::String => Ok(col.str()?.iter().map(|s| s.and_then(parse_date_str)).collect()),
        other => Err(DataError::Parse(format!(
            "Unsupported date column type: {other}"
        ))),
    }
}

fn values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = column(frame, name)?.cast(&DataType::Float64)?;
    Ok(col
        .f64()?
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Projects `frame` onto `date, open, high, low, close`, attaches `symbol`
/// and stamps every row with `now`.
///
/// Rows with a missing date or OHLC value are dropped. When a date appears
/// more than once the last row wins. Output is ordered by date.
///
/// # Errors
/// Returns [`DataError::Parse`] if a required column is missing or cannot
/// be coerced.
pub fn normalize(frame: &DataFrame, symbol: &Symbol, now: DateTime<Utc>) -> Result<Vec<SeriesPoint>> {
    let dates = dates(frame)?;
    let [open, high, low, close] = OHLC.map(|name| values(frame, name));
    let (open, high, low, close) = (open?, high?, low?, close?);

    let mut rows = BTreeMap::new();
    let mut dropped = 0usize;
    for (i, date) in dates.into_iter().enumerate() {
        match (date, open[i], high[i], low[i], close[i]) {
            (Some(date), Some(o), Some(h), Some(l), Some(c)) => {
                let point = SeriesPoint::new(symbol.clone(), date, o, h, l, c).with_last_updated(now);
                rows.insert(date, point);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(symbol = %symbol, dropped, "Dropped incomplete provider rows");
    }
    Ok(rows.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_string_dates_and_symbol_attached() {
        let frame = DataFrame::new(vec![
            Column::new("date".into(), vec!["2024-01-05", "2024-01-12"]),
            Column::new("open".into(), vec![180.0, 182.0]),
            Column::new("high".into(), vec![183.0, 186.0]),
            Column::new("low".into(), vec![179.0, 181.0]),
            Column::new("close".into(), vec![181.0, 185.0]),
            Column::new("volume".into(), vec![1_000_000u64, 1_200_000]),
        ])
        .unwrap();

        let rows = normalize(&frame, &Symbol::new("aapl"), now()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol.as_str(), "AAPL");
        assert_eq!(rows[0].date, day(5));
        assert_eq!(rows[1].close, 185.0);
        assert!(rows.iter().all(|r| r.last_updated == now()));
    }

    #[test]
    fn test_datetime_column_is_truncated() {
        let stamps = vec![
            Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 0).unwrap().timestamp_millis(),
            Utc.with_ymd_and_hms(2024, 1, 12, 23, 59, 59).unwrap().timestamp_millis(),
        ];
        let date_col = Column::new("date".into(), stamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let frame = DataFrame::new(vec![
            date_col,
            Column::new("open".into(), vec![1.0, 2.0]),
            Column::new("high".into(), vec![1.0, 2.0]),
            Column::new("low".into(), vec![1.0, 2.0]),
            Column::new("close".into(), vec![1.0, 2.0]),
        ])
        .unwrap();

        let rows = normalize(&frame, &Symbol::new("MSFT"), now()).unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(5), day(12)]);
    }

    #[test]
    fn test_date_column_and_integer_prices() {
        let days: Vec<i32> = vec![19727, 19734];
        let date_col = Column::new("date".into(), days).cast(&DataType::Date).unwrap();
        let frame = DataFrame::new(vec![
            date_col,
            Column::new("open".into(), vec![10i64, 11]),
            Column::new("high".into(), vec![12i64, 13]),
            Column::new("low".into(), vec![9i64, 10]),
            Column::new("close".into(), vec![11i64, 12]),
        ])
        .unwrap();

        let rows = normalize(&frame, &Symbol::new("NVDA"), now()).unwrap();
        assert_eq!(rows[0].date, day(5));
        assert_eq!(rows[1].date, day(12));
        assert_eq!(rows[1].high, 13.0);
    }

    #[test]
    fn test_null_rows_dropped() {
        let frame = DataFrame::new(vec![
            Column::new("date".into(), vec![Some("2024-01-05"), None, Some("2024-01-19")]),
            Column::new("open".into(), vec![Some(1.0), Some(2.0), Some(3.0)]),
            Column::new("high".into(), vec![Some(1.0), Some(2.0), None]),
            Column::new("low".into(), vec![Some(1.0), Some(2.0), Some(3.0)]),
            Column::new("close".into(), vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();

        let rows = normalize(&frame, &Symbol::new("AAPL"), now()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(5));
    }

    #[test]
    fn test_duplicate_dates_keep_last() {
        let frame = DataFrame::new(vec![
            Column::new("date".into(), vec!["2024-01-12", "2024-01-05", "2024-01-12"]),
            Column::new("open".into(), vec![1.0, 2.0, 3.0]),
            Column::new("high".into(), vec![1.0, 2.0, 3.0]),
            Column::new("low".into(), vec![1.0, 2.0, 3.0]),
            Column::new("close".into(), vec![100.0, 200.0, 300.0]),
        ])
        .unwrap();

        let rows = normalize(&frame, &Symbol::new("AAPL"), now()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, day(5));
        assert_eq!(rows[1].close, 300.0);
    }

    #[test]
    fn test_missing_column_is_parse_error() {
        let frame = DataFrame::new(vec![
            Column::new("date".into(), vec!["2024-01-05"]),
            Column::new("open".into(), vec![1.0]),
            Column::new("high".into(), vec![1.0]),
            Column::new("low".into(), vec![1.0]),
        ])
        .unwrap();

        let err = normalize(&frame, &Symbol::new("AAPL"), now()).unwrap_err();
        assert!(matches!(err, DataError::Parse(msg) if msg.contains("close")));
    }

    #[test]
    fn test_timestamp_strings_parse() {
        assert_eq!(parse_date_str("2024-01-05T21:00:00Z"), Some(day(5)));
        assert_eq!(parse_date_str("2024-01-05 09:30:00"), Some(day(5)));
        assert_eq!(parse_date_str("not a date"), None);
    }
}
