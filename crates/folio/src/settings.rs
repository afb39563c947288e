//! Application settings with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use folio_cache::{CacheConfig, TieredCache, TtlPolicy};
use folio_core::{DataError, Granularity, Result, Symbol};
use folio_sync::{MAX_LOOKBACK_YEARS, SyncConfig};
use tracing::debug;

/// Overrides the snapshot directory.
pub const ENV_CACHE_DIR: &str = "FOLIO_CACHE_DIR";
/// Overrides the SQLite database path.
pub const ENV_DB_PATH: &str = "FOLIO_DB_PATH";
/// Comma separated default ticker list.
pub const ENV_TICKERS: &str = "FOLIO_TICKERS";
/// History depth in years for symbols with no rows.
pub const ENV_LOOKBACK_YEARS: &str = "FOLIO_LOOKBACK_YEARS";
/// Persistence threshold in seconds.
pub const ENV_PERSIST_THRESHOLD_SECS: &str = "FOLIO_PERSIST_THRESHOLD_SECS";
/// Series granularity (`daily`, `weekly`, `monthly`).
pub const ENV_GRANULARITY: &str = "FOLIO_GRANULARITY";

/// Tickers synced when nothing else is configured.
pub const DEFAULT_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "JPM", "V", "WMT", "JNJ", "PG", "MA",
    "HD", "DIS", "BAC", "ADBE", "CRM", "NFLX", "INTC", "CSCO",
];

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "folio.db";

/// Everything the library and CLI need to wire up a [`MarketData`](crate::MarketData)
/// and an [`IncrementalSeriesSync`](crate::IncrementalSeriesSync).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Cache snapshot location and persistence threshold.
    pub cache: CacheConfig,
    /// Per-call-site TTLs.
    pub ttl: TtlPolicy,
    /// Row store database file.
    pub db_path: PathBuf,
    /// Default ticker list.
    pub tickers: Vec<Symbol>,
    /// Sync settings.
    pub sync: SyncConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            ttl: TtlPolicy::default(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            tickers: Symbol::normalize_all(DEFAULT_TICKERS.iter().map(|s| Symbol::new(*s))),
            sync: SyncConfig::default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DataError::InvalidParameter(format!("{name} must be a non-negative integer, got {raw:?}")))
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] when a variable is set but
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, starting from the defaults.
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] when a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(dir) = get(ENV_CACHE_DIR) {
            settings.cache = settings.cache.with_dir(dir.trim());
        }
        if let Some(secs) = get(ENV_PERSIST_THRESHOLD_SECS) {
            let secs: u64 = parse_number(ENV_PERSIST_THRESHOLD_SECS, &secs)?;
            settings.cache = settings.cache.with_persist_threshold(Duration::from_secs(secs));
        }
        if let Some(path) = get(ENV_DB_PATH) {
            settings.db_path = PathBuf::from(path.trim());
        }
        if let Some(list) = get(ENV_TICKERS) {
            let tickers = Symbol::parse_list(&list);
            if tickers.is_empty() {
                return Err(DataError::InvalidParameter(format!(
                    "{ENV_TICKERS} has no symbols: {list:?}"
                )));
            }
            settings.tickers = tickers;
        }
        if let Some(years) = get(ENV_LOOKBACK_YEARS) {
            let years: u32 = parse_number(ENV_LOOKBACK_YEARS, &years)?;
            if years > MAX_LOOKBACK_YEARS {
                return Err(DataError::InvalidParameter(format!(
                    "{ENV_LOOKBACK_YEARS} must be at most {MAX_LOOKBACK_YEARS}, got {years}"
                )));
            }
            settings.sync = settings.sync.with_lookback_years(years);
        }
        if let Some(granularity) = get(ENV_GRANULARITY) {
            settings.sync = settings.sync.with_granularity(granularity.parse::<Granularity>()?);
        }

        debug!(?settings, "Loaded settings");
        Ok(settings)
    }

    /// Opens the cache described by these settings.
    #[must_use]
    pub fn open_cache(&self) -> TieredCache {
        TieredCache::open(self.cache.clone())
    }

    /// Opens the SQLite row store at [`db_path`](Self::db_path).
    ///
    /// # Errors
    /// Returns [`DataError::Store`] if the database cannot be opened.
    #[cfg(feature = "store-sqlite")]
    pub fn open_store(&self) -> Result<folio_store::SqliteRowStore> {
        folio_store::SqliteRowStore::open(&self.db_path)
    }
}
