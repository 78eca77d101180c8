//! Inventory source resolution for the CLI

use anyhow::{Context, Result};
use inventory_lib::client::HttpConnector;
use inventory_lib::inventory::cache_key;
use inventory_lib::{CacheStore, InventoryBuilder, InventoryConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inventory source used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "./inventory.vergeos_vms.yml";

/// A loaded and validated inventory source file
pub struct InventorySource {
    path: PathBuf,
    config: InventoryConfig,
}

impl InventorySource {
    pub fn load(path: &Path) -> Result<Self> {
        let config = InventoryConfig::load(path)
            .with_context(|| format!("Failed to load inventory source {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Cache key derived from the absolute source path
    pub fn cache_key(&self) -> String {
        let path = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        cache_key(&path)
    }

    pub fn cache_store(&self) -> Option<CacheStore> {
        self.config.cache_store()
    }

    /// Pipeline over the HTTP transport
    pub fn builder(&self) -> Result<InventoryBuilder> {
        let builder = InventoryBuilder::new(self.config.clone(), Arc::new(HttpConnector))?;
        Ok(builder)
    }
}
