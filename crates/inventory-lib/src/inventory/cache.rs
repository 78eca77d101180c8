//! Inventory cache codec and file-backed cache store
//!
//! The codec turns a populated [`InventoryGraph`] into a [`CacheRecord`] and
//! back without contacting any site. The store persists records as JSON
//! envelopes keyed by the inventory source path and expires them after
//! `cache_timeout`.

use super::{is_reserved, HostVars, InventoryGraph};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cache lifetime (1 hour)
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 3600;

const CACHE_KEY_PREFIX: &str = "vergeos_vms_";

/// Snapshot of everything population would otherwise recompute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub hosts: BTreeMap<String, HostVars>,
    pub groups: BTreeMap<String, Vec<String>>,
}

impl InventoryGraph {
    /// Serialize hosts, variables and non-structural groups
    pub fn serialize_cache(&self) -> CacheRecord {
        let groups = self
            .groups
            .iter()
            .map(|(name, members)| (name.clone(), members.iter().cloned().collect()))
            .collect();

        CacheRecord {
            hosts: self.hosts.clone(),
            groups,
        }
    }

    /// Rebuild the graph from a cache record.
    ///
    /// Group members that were not restored as hosts are skipped. Restoring
    /// the same record twice yields the same graph as restoring it once.
    pub fn restore_cache(&mut self, record: &CacheRecord) {
        for (host, vars) in &record.hosts {
            self.add_host(host);
            if let Some(existing) = self.hosts.get_mut(host) {
                existing.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        for (group, members) in &record.groups {
            if is_reserved(group) {
                continue;
            }
            self.add_group(group);
            for host in members {
                if !self.contains_host(host) {
                    debug!(group = %group, host = %host, "Skipping cached member with no host");
                    continue;
                }
                let _ = self.add_child(group, host);
            }
        }
    }

    /// Build a fresh graph from a cache record
    pub fn from_cache(record: &CacheRecord) -> Self {
        let mut graph = Self::new();
        graph.restore_cache(record);
        graph
    }
}

/// Cache key for an inventory source path
pub fn cache_key(source: &Path) -> String {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    let hex = hex::encode(digest);
    format!("{}{}", CACHE_KEY_PREFIX, &hex[..16])
}

/// On-disk entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    /// Unix seconds
    written_at: i64,
    record: CacheRecord,
}

/// JSON file cache of inventory records
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    timeout: Duration,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load a live entry. Missing, expired and corrupt entries are misses.
    pub fn load(&self, key: &str) -> Option<CacheRecord> {
        let path = self.entry_path(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(_) => {
                debug!(path = %path.display(), "No cache entry");
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                return None;
            }
        };

        let age = Utc::now().timestamp().saturating_sub(envelope.written_at).max(0) as u64;
        if age >= self.timeout.as_secs() {
            debug!(path = %path.display(), age_secs = age, "Cache entry expired");
            return None;
        }

        Some(envelope.record)
    }

    /// Write an entry, replacing any previous one atomically
    pub fn save(&self, key: &str, record: &CacheRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {:?}", self.dir))?;

        let envelope = CacheEnvelope {
            written_at: Utc::now().timestamp(),
            record: record.clone(),
        };
        let json = serde_json::to_vec(&envelope).context("Failed to serialize cache entry")?;

        let path = self.entry_path(key);
        let temp_path = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;
        file.write_all(&json).context("Failed to write cache entry")?;
        file.sync_all().context("Failed to sync cache entry")?;

        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        debug!(path = %path.display(), hosts = record.hosts.len(), "Inventory cache written");
        Ok(())
    }

    /// Remove an entry. Returns true if one existed.
    pub fn clear(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove cache entry {:?}", path)),
        }
    }
}
