#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Features
//!
//! - `yahoo` - Yahoo Finance provider for series, quotes and fundamentals
//! - `store-sqlite` - SQLite-backed row store

// Core types and traits
pub use folio_core::*;

pub use folio_cache::{CacheConfig, CacheKey, CacheStats, DEFAULT_PERSIST_THRESHOLD, TieredCache, TtlPolicy};

pub use folio_store::InMemoryRowStore;
#[cfg(feature = "store-sqlite")]
pub use folio_store::SqliteRowStore;

pub use folio_sync::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_LOOKBACK_YEARS, IncrementalSeriesSync, MAX_LOOKBACK_YEARS,
    RefreshSchedule, SymbolOutcome, SyncConfig, SyncReport, lookback_for_years,
    normalize::normalize,
};

#[cfg(feature = "yahoo")]
pub use folio_yahoo::YahooProvider;

mod market_data;
mod records;
/// Application settings.
pub mod settings;

pub use market_data::MarketData;
pub use settings::Settings;
