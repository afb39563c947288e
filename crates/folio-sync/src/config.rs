//! Sync configuration.

use chrono::TimeDelta;
use folio_core::Granularity;
use std::time::Duration;

/// Default history depth for symbols with no persisted rows.
pub const DEFAULT_LOOKBACK_YEARS: u32 = 10;

/// Deepest history a symbol with no rows can request.
pub const MAX_LOOKBACK_YEARS: u32 = 200;

/// Default per-request deadline for a provider fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for an [`IncrementalSeriesSync`](crate::IncrementalSeriesSync) run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// How far back to fetch when a symbol has no rows yet.
    pub lookback: TimeDelta,
    /// Sampling interval requested from the provider.
    pub granularity: Granularity,
    /// Deadline for a single provider fetch.
    pub fetch_timeout: Duration,
    /// Number of symbols synced at once. `1` runs sequentially in input order.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback: lookback_for_years(DEFAULT_LOOKBACK_YEARS),
            granularity: Granularity::Weekly,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            concurrency: 1,
        }
    }
}

/// Converts whole years to a lookback span of `365 * years` days, capped at
/// [`MAX_LOOKBACK_YEARS`].
#[must_use]
pub fn lookback_for_years(years: u32) -> TimeDelta {
    TimeDelta::days(365 * i64::from(years.min(MAX_LOOKBACK_YEARS)))
}

impl SyncConfig {
    /// Sets the lookback span.
    #[must_use]
    pub const fn with_lookback(mut self, lookback: TimeDelta) -> Self {
        self.lookback = lookback;
        self
    }

    /// Sets the lookback span in whole years, capped at [`MAX_LOOKBACK_YEARS`].
    #[must_use]
    pub fn with_lookback_years(self, years: u32) -> Self {
        self.with_lookback(lookback_for_years(years))
    }

    /// Sets the granularity.
    #[must_use]
    pub const fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Sets the per-fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets how many symbols run at once; values below 1 are treated as 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
