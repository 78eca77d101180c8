//! Owned inventory graph of hosts, groups and host variables
//!
//! `all` and `ungrouped` are structural: `all` always contains every host
//! and `ungrouped` every host that belongs to no other group. Neither is
//! stored, so neither can be serialized. `_meta` is reserved for the
//! hostvars document and is never a group.

mod cache;

pub use cache::{cache_key, CacheRecord, CacheStore, DEFAULT_CACHE_TIMEOUT_SECS};

use crate::error::InventoryError;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Flat variable namespace of one host
pub type HostVars = BTreeMap<String, Value>;

pub const ALL_GROUP: &str = "all";
pub const UNGROUPED_GROUP: &str = "ungrouped";
pub const META_KEY: &str = "_meta";

/// Whether a group name is one of the structural groups
pub fn is_structural(group: &str) -> bool {
    group == ALL_GROUP || group == UNGROUPED_GROUP
}

/// Whether a name can never be stored as a group
pub fn is_reserved(group: &str) -> bool {
    is_structural(group) || group == META_KEY
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryGraph {
    hosts: BTreeMap<String, HostVars>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl InventoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host if absent. Returns true if the host is new.
    pub fn add_host(&mut self, name: &str) -> bool {
        if self.hosts.contains_key(name) {
            return false;
        }
        self.hosts.insert(name.to_string(), HostVars::new());
        true
    }

    pub fn contains_host(&self, name: &str) -> bool {
        self.hosts.contains_key(name)
    }

    pub fn set_variable(&mut self, host: &str, var: &str, value: Value) -> Result<(), InventoryError> {
        let vars = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| InventoryError::UnknownHost(host.to_string()))?;
        vars.insert(var.to_string(), value);
        Ok(())
    }

    /// Set many variables on a host at once
    pub fn set_variables(&mut self, host: &str, vars: HostVars) -> Result<(), InventoryError> {
        let existing = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| InventoryError::UnknownHost(host.to_string()))?;
        existing.extend(vars);
        Ok(())
    }

    pub fn host_vars(&self, host: &str) -> Option<&HostVars> {
        self.hosts.get(host)
    }

    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Add a group if absent. Reserved names are never added.
    pub fn add_group(&mut self, name: &str) -> bool {
        if is_reserved(name) || self.groups.contains_key(name) {
            return false;
        }
        self.groups.insert(name.to_string(), BTreeSet::new());
        true
    }

    pub fn contains_group(&self, name: &str) -> bool {
        is_structural(name) || self.groups.contains_key(name)
    }

    /// Add an existing host to an existing group. Idempotent; a no-op for
    /// reserved names.
    pub fn add_child(&mut self, group: &str, host: &str) -> Result<(), InventoryError> {
        if !self.hosts.contains_key(host) {
            return Err(InventoryError::UnknownHost(host.to_string()));
        }
        if is_reserved(group) {
            return Ok(());
        }
        let members = self
            .groups
            .get_mut(group)
            .ok_or_else(|| InventoryError::UnknownGroup(group.to_string()))?;
        members.insert(host.to_string());
        Ok(())
    }

    /// Non-structural group names
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Sorted member hosts of a group, including the structural groups
    pub fn group_hosts(&self, group: &str) -> Vec<&str> {
        match group {
            ALL_GROUP => self.host_names().collect(),
            UNGROUPED_GROUP => self.ungrouped_hosts(),
            _ => self
                .groups
                .get(group)
                .map(|members| members.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        }
    }

    /// Groups a host belongs to, excluding the structural groups
    pub fn host_groups(&self, host: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(host))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn ungrouped_hosts(&self) -> Vec<&str> {
        self.host_names()
            .filter(|host| self.groups.values().all(|members| !members.contains(*host)))
            .collect()
    }

    /// Render the Ansible dynamic inventory `--list` document
    pub fn to_ansible_json(&self) -> Value {
        let mut doc = Map::new();

        let hostvars: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(name, vars)| {
                let vars: Map<String, Value> =
                    vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                (name.clone(), Value::Object(vars))
            })
            .collect();
        doc.insert(META_KEY.to_string(), json!({ "hostvars": hostvars }));

        let mut children: Vec<&str> = self.group_names().collect();
        children.push(UNGROUPED_GROUP);
        doc.insert(ALL_GROUP.to_string(), json!({ "children": children }));

        for (name, members) in &self.groups {
            doc.insert(name.clone(), json!({ "hosts": members }));
        }
        doc.insert(
            UNGROUPED_GROUP.to_string(),
            json!({ "hosts": self.ungrouped_hosts() }),
        );

        Value::Object(doc)
    }
}
