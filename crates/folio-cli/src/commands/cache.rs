//! `folio cache`: tiered cache inspection.

use anyhow::{Context, Result};
use clap::Subcommand;
use folio::{CacheConfig, TieredCache};
use tracing::info;

#[derive(Debug, Subcommand)]
pub(crate) enum CacheAction {
    /// Print entry counts and the snapshot location as JSON
    Stats,
    /// Drop every entry and delete the snapshot file
    Clear,
}

pub(crate) fn run(action: CacheAction, config: CacheConfig) -> Result<()> {
    let cache = TieredCache::open(config);
    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            let json = serde_json::to_string_pretty(&stats).context("Failed to render stats")?;
            println!("{json}");
        }
        CacheAction::Clear => {
            let removed = cache.size();
            cache.clear();
            info!(removed, "Cache cleared");
            println!("Cleared {removed} cache entries.");
        }
    }
    Ok(())
}
