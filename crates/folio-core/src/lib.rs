#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for cached market data and incremental series sync.
//!
//! This crate provides the foundational abstractions shared by the workspace:
//!
//! - [`RemoteSeriesProvider`](provider::RemoteSeriesProvider) - OHLC price history
//! - [`RemoteQuoteProvider`](provider::RemoteQuoteProvider) - Live quotes
//! - [`RemoteFundamentalsProvider`](provider::RemoteFundamentalsProvider) - Fundamentals
//! - [`RowStore`](store::RowStore) - Persisted series keyed by `(symbol, date)`
//! - [`FetchWindow`](window::FetchWindow) - Cursor-based fetch windows

/// Error types for data operations.
pub mod error;
/// Series granularity definitions.
pub mod granularity;
/// Provider traits for fetching market data.
pub mod provider;
/// Row store trait for the persisted series table.
pub mod store;
/// Core data types (Symbol, SeriesPoint, Quote, etc.).
pub mod types;
/// Fetch window computation.
pub mod window;

// Re-export commonly used items at crate root
pub use error::{DataError, Result};
pub use granularity::Granularity;
pub use provider::{
    DataProvider, RemoteFundamentalsProvider, RemoteQuoteProvider, RemoteSeriesProvider,
};
pub use store::RowStore;
pub use types::{Quote, SeriesPoint, StoreSummary, Symbol};
pub use window::FetchWindow;
