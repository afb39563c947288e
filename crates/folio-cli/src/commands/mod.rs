//! Subcommand implementations.

pub(crate) mod cache;
pub(crate) mod sync;
pub(crate) mod verify;
