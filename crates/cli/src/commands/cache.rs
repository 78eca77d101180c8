//! Cache management commands

use anyhow::Result;

use crate::config::InventorySource;
use crate::output::{print_success, print_warning};

/// Remove the cached inventory for this source
pub fn clear_cache(source: &InventorySource) -> Result<()> {
    let Some(store) = source.cache_store() else {
        print_warning("Caching is disabled for this inventory source");
        return Ok(());
    };

    let key = source.cache_key();
    if store.clear(&key)? {
        print_success(&format!("Cleared cache entry {}", key));
    } else {
        print_warning(&format!("No cache entry {} in {}", key, store.dir().display()));
    }
    Ok(())
}
