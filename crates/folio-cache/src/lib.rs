#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Two-tier TTL cache for expensive remote calls.
//!
//! - [`TieredCache`] - In-memory hot tier with a JSON snapshot on disk
//! - [`CacheKey`] - Call-site name plus argument fingerprint
//! - [`CacheConfig`] / [`TtlPolicy`] - Snapshot location, persistence threshold, per-call TTLs

/// Cache configuration and TTL policy.
pub mod config;
/// Cache keys for memoized calls.
pub mod key;
mod snapshot;
/// The tiered cache.
pub mod tiered;

pub use config::{CacheConfig, DEFAULT_PERSIST_THRESHOLD, TtlPolicy};
pub use key::CacheKey;
pub use tiered::{CacheStats, TieredCache};
