//! CLI command implementations

pub mod cache;
pub mod list;
pub mod sites;

use crate::config::InventorySource;
use crate::output::print_info;
use anyhow::Result;
use inventory_lib::{BuildOutcome, BuildSource};

/// Build the inventory for a source, through its cache when enabled
pub async fn build_inventory(source: &InventorySource, refresh: bool) -> Result<BuildOutcome> {
    let builder = source.builder()?;
    let store = source.cache_store();
    let outcome = builder
        .build(store.as_ref(), &source.cache_key(), refresh)
        .await?;
    Ok(outcome)
}

/// Note a cache-served inventory in human output
pub fn note_source(outcome: &BuildOutcome) {
    if outcome.source == BuildSource::Cache {
        print_info("Served from cache (use --refresh-cache to fetch)");
    }
}
