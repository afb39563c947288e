//! Core data types for cached market data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`SeriesPoint`] - One persisted OHLC observation, keyed by `(symbol, date)`
//! - [`Quote`] - Live quote-like snapshot for a symbol
//! - [`StoreSummary`] - Aggregate view over the persisted series table

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trading symbol/ticker.
///
/// Symbols are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the symbol is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses a comma separated ticker list, dropping blanks and duplicates
    /// while keeping first-seen order.
    #[must_use]
    pub fn parse_list(s: &str) -> Vec<Self> {
        Self::normalize_all(s.split(',').map(Self::new))
    }

    /// Drops blank symbols and later duplicates, keeping first-seen order.
    #[must_use]
    pub fn normalize_all(symbols: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut seen = std::collections::HashSet::new();
        symbols
            .into_iter()
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One OHLC observation in the persisted series table.
///
/// `(symbol, date)` is the primary key. `last_updated` records when the row
/// was written and is only used for observability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Ticker the observation belongs to.
    pub symbol: Symbol,
    /// Calendar date of the observation.
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// When this row was written.
    pub last_updated: DateTime<Utc>,
}

impl SeriesPoint {
    /// Creates a new series point stamped with the current time.
    #[must_use]
    pub fn new(symbol: Symbol, date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            symbol,
            date,
            open,
            high,
            low,
            close,
            last_updated: Utc::now(),
        }
    }

    /// Overrides the write timestamp.
    #[must_use]
    pub const fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }
}

/// Quote snapshot for a single symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Display name, falling back to the symbol.
    pub name: String,
    /// Last traded price.
    pub price: f64,
    /// Percent change against the previous close.
    pub change_percent: f64,
    /// Market capitalization.
    pub market_cap: Option<f64>,
    /// Trailing price-to-earnings ratio.
    pub pe_ratio: Option<f64>,
    /// Dividend yield.
    pub dividend_yield: Option<f64>,
    /// Beta coefficient.
    pub beta: Option<f64>,
    /// Business sector.
    pub sector: Option<String>,
    /// Industry within the sector.
    pub industry: Option<String>,
}

impl Quote {
    /// Creates a quote with the required pricing fields.
    #[must_use]
    pub fn new(symbol: Symbol, price: f64, change_percent: f64) -> Self {
        Self {
            name: symbol.to_string(),
            symbol,
            price,
            change_percent,
            ..Default::default()
        }
    }

    /// Percent change from `previous_close` to `price`, or 0 when the previous
    /// close is not positive.
    #[must_use]
    pub fn change_from(price: f64, previous_close: f64) -> f64 {
        if previous_close > 0.0 {
            (price - previous_close) / previous_close * 100.0
        } else {
            0.0
        }
    }
}

/// Aggregate view of the persisted series table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Total number of rows.
    pub total_rows: usize,
    /// Number of distinct symbols.
    pub unique_symbols: usize,
    /// Earliest observation date.
    pub earliest_date: Option<NaiveDate>,
    /// Latest observation date.
    pub latest_date: Option<NaiveDate>,
    /// Most recent write timestamp.
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new(" aapl ").as_str(), "AAPL");
        assert_eq!(Symbol::from("brk.b").to_string(), "BRK.B");
    }

    #[test]
    fn test_parse_list_drops_blanks_and_duplicates() {
        let symbols = Symbol::parse_list("aapl, msft,,AAPL , nvda,");
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "NVDA"]);
    }

    #[test]
    fn test_change_from() {
        assert!((Quote::change_from(110.0, 100.0) - 10.0).abs() < 1e-9);
        assert_eq!(Quote::change_from(110.0, 0.0), 0.0);
    }

    #[test]
    fn test_quote_name_defaults_to_symbol() {
        let quote = Quote::new(Symbol::new("v"), 280.0, 1.5);
        assert_eq!(quote.name, "V");
    }
}
