#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Incremental series synchronization.
//!
//! - [`IncrementalSeriesSync`] - Cursor-based per-symbol fetch and upsert
//! - [`SyncConfig`] - Lookback, granularity, timeout and concurrency
//! - [`RefreshSchedule`] - Weekly "is a refresh due" gate
//! - [`normalize`](normalize::normalize) - Provider frame to persisted rows

/// Sync configuration.
pub mod config;
/// Provider frame normalization.
pub mod normalize;
/// Weekly refresh schedule.
pub mod schedule;
/// The sync batch.
pub mod sync;

pub use config::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_LOOKBACK_YEARS, MAX_LOOKBACK_YEARS, SyncConfig,
    lookback_for_years,
};
pub use schedule::RefreshSchedule;
pub use sync::{IncrementalSeriesSync, SymbolOutcome, SyncReport};
