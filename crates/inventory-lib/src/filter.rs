//! VM inclusion filters, hostname resolution and name sanitizing

use crate::config::FilterConfig;
use crate::error::ConfigError;
use crate::models::RawVm;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Default inventory hostname template
pub const DEFAULT_HOSTNAME_TEMPLATE: &str = "{site}_{name}";

/// Status values treated as "stopped" when stopped VMs are excluded
pub const STOPPED_STATUSES: [&str; 3] = ["stopped", "offline", "powered_off"];

/// Compiled VM inclusion rules. All predicates are ANDed.
#[derive(Debug, Clone)]
pub struct VmFilter {
    status: Option<String>,
    name_pattern: Option<Regex>,
    fields: BTreeMap<String, Value>,
    include_stopped: bool,
    include_snapshots: bool,
}

impl Default for VmFilter {
    fn default() -> Self {
        Self {
            status: None,
            name_pattern: None,
            fields: BTreeMap::new(),
            include_stopped: true,
            include_snapshots: false,
        }
    }
}

impl VmFilter {
    /// Compile filters from configuration
    pub fn new(
        filters: &FilterConfig,
        include_stopped: bool,
        include_snapshots: bool,
    ) -> Result<Self, ConfigError> {
        let name_pattern = filters
            .name_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;

        Ok(Self {
            status: filters.status.clone(),
            name_pattern,
            fields: filters.fields.clone(),
            include_stopped,
            include_snapshots,
        })
    }

    /// Decide whether a VM belongs in the inventory
    pub fn should_include(&self, vm: &RawVm) -> bool {
        if vm.is_snapshot() && !self.include_snapshots {
            return false;
        }

        if !self.include_stopped {
            let status = vm.status().unwrap_or("");
            if STOPPED_STATUSES.contains(&status) {
                return false;
            }
        }

        if let Some(expected) = &self.status {
            if vm.effective_status() != Some(expected.as_str()) {
                return false;
            }
        }

        if let Some(pattern) = &self.name_pattern {
            if !pattern.is_match(vm.name().unwrap_or("")) {
                return false;
            }
        }

        self.fields.iter().all(|(field, expected)| {
            let actual = vm.field(field).unwrap_or(&Value::Null);
            values_match(expected, actual)
        })
    }
}

/// Compare a configured filter value with a VM field.
///
/// Values from config files and environment overrides may arrive as
/// strings, so a string filter also matches a number or bool with the
/// same rendering.
fn values_match(expected: &Value, actual: &Value) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (Value::String(s), Value::Number(n)) => s == &n.to_string(),
        (Value::String(s), Value::Bool(b)) => s == &b.to_string(),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => false,
    }
}

/// Build the inventory hostname for a VM from a `{site}`/`{name}` template.
///
/// The VM name falls back to its `$key`. Every character outside
/// `[A-Za-z0-9_-]` is replaced with `_`.
pub fn resolve_hostname(vm: &RawVm, site_name: &str, template: &str) -> String {
    let name = match (vm.name(), vm.key()) {
        (Some(name), _) => name.to_string(),
        (None, Some(key)) => key.to_string(),
        (None, None) => String::new(),
    };
    let hostname = template.replace("{site}", site_name).replace("{name}", &name);

    hostname
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Make a string usable as a group name: `[a-z0-9_]` only, never starting
/// with a digit.
pub fn sanitize_group_name(raw: &str) -> String {
    let mut sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized.to_ascii_lowercase()
}
