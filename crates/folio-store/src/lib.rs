#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/folio/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Row store implementations for the persisted series table.
//!
//! This crate provides implementations of the [`RowStore`] trait from `folio-core`:
//!
//! - [`SqliteRowStore`] - Persistent SQLite table (default, requires `sqlite` feature)
//! - [`InMemoryRowStore`] - Ordered in-memory table for testing

/// In-memory row store implementation.
pub mod memory;

/// SQLite-based row store implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use folio_core::RowStore;

pub use memory::InMemoryRowStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRowStore;
