//! `folio verify`: summary of the series table.

use std::path::Path;

use anyhow::{Context, Result};
use folio::{RowStore, SeriesPoint, SqliteRowStore, StoreSummary};

const RECENT_ROWS: usize = 5;

pub(crate) async fn run(db: &Path) -> Result<()> {
    if !db.exists() {
        anyhow::bail!("No database at {}; run `folio sync` first", db.display());
    }
    let store = SqliteRowStore::open(db).with_context(|| format!("Failed to open {}", db.display()))?;

    let summary = store.summary().await.context("Failed to read store summary")?;
    let recent = store.recent(RECENT_ROWS).await.context("Failed to read recent rows")?;

    println!("{}", render_summary(db, &summary));
    if !recent.is_empty() {
        println!();
        println!("Most recent rows:");
        println!("{}", render_rows(&recent));
    }
    Ok(())
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn render_summary(db: &Path, summary: &StoreSummary) -> String {
    format!(
        "Database:       {}\nTotal rows:     {}\nUnique symbols: {}\nDate range:     {} to {}\nLast updated:   {}",
        db.display(),
        summary.total_rows,
        summary.unique_symbols,
        or_dash(summary.earliest_date),
        or_dash(summary.latest_date),
        or_dash(summary.last_updated.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC"))),
    )
}

fn render_rows(rows: &[SeriesPoint]) -> String {
    let mut out = format!(
        "{:<8} {:<10} {:>10} {:>10} {:>10} {:>10}",
        "symbol", "date", "open", "high", "low", "close"
    );
    for row in rows {
        out.push_str(&format!(
            "\n{:<8} {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            row.symbol,
            row.date.to_string(),
            row.open,
            row.high,
            row.low,
            row.close
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use folio::Symbol;

    #[test]
    fn test_summary_of_empty_store() {
        let text = render_summary(Path::new("folio.db"), &StoreSummary::default());
        assert!(text.contains("Total rows:     0"));
        assert!(text.contains("Date range:     - to -"));
    }

    #[test]
    fn test_rows_table() {
        let row = SeriesPoint::new(
            Symbol::new("AAPL"),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            180.0,
            183.5,
            179.25,
            181.0,
        )
        .with_last_updated(Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap());

        let table = render_rows(&[row]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("AAPL     2024-01-05"));
        assert!(lines[1].ends_with("181.00"));
    }
}
