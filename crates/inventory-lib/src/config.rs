//! Inventory source configuration
//!
//! A `*.vergeos_vms.yml` file layered with `VERGEOS_INVENTORY_*`
//! environment overrides (nested keys use `__`, e.g.
//! `VERGEOS_INVENTORY_FILTERS__STATUS=running`).

use crate::error::ConfigError;
use crate::fetch::{FetchOptions, DEFAULT_MAX_WORKERS, DEFAULT_SITE_TIMEOUT_SECS};
use crate::filter::{VmFilter, DEFAULT_HOSTNAME_TEMPLATE};
use crate::grouping::{default_group_by, GroupDimension};
use crate::hostvars::{HostVarProjector, DEFAULT_HOSTVAR_PREFIX};
use crate::inventory::{CacheStore, DEFAULT_CACHE_TIMEOUT_SECS};
use crate::models::SiteConfig;
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Plugin identifiers accepted in the `plugin` key
pub const PLUGIN_NAMES: [&str; 2] = ["vergeos_vms", "vergeio.vergeos.vergeos_vms"];

/// File name suffixes recognized as VergeOS inventory sources
pub const SOURCE_SUFFIXES: [&str; 2] = [".vergeos_vms.yml", ".vergeos_vms.yaml"];

const ENV_PREFIX: &str = "VERGEOS_INVENTORY";

/// Whether a path names a VergeOS inventory source
pub fn verify_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| SOURCE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
        .unwrap_or(false)
}

/// VM filters. Keys other than `status` and `name_pattern` are exact
/// field matches against the VM record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name_pattern: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// One `keyed_groups` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyedGroupConfig {
    /// Host variable to group by
    pub key: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Used when the variable is missing or null
    #[serde(default)]
    pub default_value: Option<Value>,
}

fn default_separator() -> String {
    "_".to_string()
}

/// Inventory source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub plugin: String,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default = "default_group_by")]
    pub group_by: Vec<GroupDimension>,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-site fetch budget in seconds
    #[serde(default = "default_site_timeout")]
    pub site_timeout: u64,

    #[serde(default = "default_hostname_template")]
    pub hostname_template: String,

    #[serde(default = "default_hostvar_prefix")]
    pub hostvar_prefix: String,

    #[serde(default = "default_true")]
    pub include_stopped: bool,

    #[serde(default)]
    pub include_snapshots: bool,

    /// Abort on post-processing hook errors instead of skipping the host
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub keyed_groups: Vec<KeyedGroupConfig>,

    #[serde(default)]
    pub cache: bool,

    /// Cache directory
    #[serde(default)]
    pub cache_connection: Option<PathBuf>,

    /// Cache lifetime in seconds
    #[serde(default = "default_cache_timeout")]
    pub cache_timeout: u64,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_site_timeout() -> u64 {
    DEFAULT_SITE_TIMEOUT_SECS
}

fn default_hostname_template() -> String {
    DEFAULT_HOSTNAME_TEMPLATE.to_string()
}

fn default_hostvar_prefix() -> String {
    DEFAULT_HOSTVAR_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_timeout() -> u64 {
    DEFAULT_CACHE_TIMEOUT_SECS
}

impl InventoryConfig {
    /// Load and validate an inventory source file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !verify_file(path) {
            return Err(ConfigError::UnsupportedSource(path.display().to_string()));
        }

        let config = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_overrides())
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text, without environment overrides
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce an inventory
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PLUGIN_NAMES.contains(&self.plugin.as_str()) {
            return Err(ConfigError::WrongPlugin(self.plugin.clone()));
        }

        if self.sites.is_empty() {
            return Err(ConfigError::NoSites);
        }

        let mut seen = HashSet::new();
        for (index, site) in self.sites.iter().enumerate() {
            if site.name.is_empty() {
                return Err(ConfigError::MissingSiteName(index));
            }
            if site.host.is_empty() {
                return Err(ConfigError::MissingHost(site.name.clone()));
            }
            if site.credential().is_none() {
                return Err(ConfigError::MissingCredentials(site.name.clone()));
            }
            if !seen.insert(site.name.as_str()) {
                return Err(ConfigError::DuplicateSite(site.name.clone()));
            }
        }

        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        self.vm_filter()?;
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_workers: self.max_workers,
            site_timeout: Duration::from_secs(self.site_timeout),
        }
    }

    pub fn vm_filter(&self) -> Result<VmFilter, ConfigError> {
        VmFilter::new(&self.filters, self.include_stopped, self.include_snapshots)
    }

    pub fn projector(&self) -> HostVarProjector {
        HostVarProjector::new(self.hostvar_prefix.clone())
    }

    /// Directory holding cache entries
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_connection.clone().unwrap_or_else(|| {
            dirs_next::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("vergeos_inventory")
        })
    }

    /// Cache store, if caching is enabled
    pub fn cache_store(&self) -> Option<CacheStore> {
        self.cache.then(|| {
            CacheStore::new(self.cache_dir(), Duration::from_secs(self.cache_timeout))
        })
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
