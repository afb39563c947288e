//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers every failure that can occur
//! when fetching from a remote provider, reshaping a payload, or talking to the
//! row store. The cache never surfaces these; it logs and degrades instead.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, bad status codes, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Data is not available for the requested symbol and date range.
    #[error("Data not available for {symbol} in range {start} to {end}")]
    DataNotAvailable {
        /// The symbol that was requested.
        symbol: String,
        /// Start of the requested date range.
        start: String,
        /// End of the requested date range.
        end: String,
    },

    /// Error parsing or reshaping data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error encoding or decoding a cached value.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Error reading from or writing to the row store.
    #[error("Store error: {0}")]
    Store(String),

    /// A remote request did not complete within its deadline.
    #[error("Request for {symbol} timed out after {after:?}")]
    Timeout {
        /// The symbol being fetched.
        symbol: String,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns true for failures worth retrying on a later run
    /// (network trouble, rate limits, timeouts).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

impl From<polars::error::PolarsError> for DataError {
    fn from(e: polars::error::PolarsError) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Cache(e.to_string())
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DataError::Network("reset".into()).is_transient());
        assert!(
            DataError::Timeout {
                symbol: "AAPL".into(),
                after: Duration::from_secs(30),
            }
            .is_transient()
        );
        assert!(!DataError::SymbolNotFound("ZZZZ".into()).is_transient());
        assert!(!DataError::Store("locked".into()).is_transient());
    }

    #[test]
    fn test_display_includes_context() {
        let err = DataError::Timeout {
            symbol: "MSFT".into(),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Request for MSFT timed out after 5s");
    }
}
