//! Host variable projection
//!
//! Flattens a joined VM record into prefixed inventory variables. The
//! projection is API-only: it never emits a connection target such as
//! `ansible_host`. Consumers that need one compose it from `<prefix>ip`.

use crate::inventory::HostVars;
use crate::models::RawVm;
use serde_json::Value;

/// Default prefix for projected variables
pub const DEFAULT_HOSTVAR_PREFIX: &str = "vergeos_";

/// Variables a projection must never produce
pub const CONNECTION_VARIABLES: [&str; 2] = ["ansible_host", "ansible_ssh_host"];

/// Copied from the VM record as-is, `null` when absent
const PASSTHROUGH_FIELDS: [&str; 9] = [
    "name",
    "machine",
    "status",
    "ram",
    "cpu_cores",
    "os_family",
    "os_description",
    "tenant",
    "cluster",
];

#[derive(Debug, Clone)]
pub struct HostVarProjector {
    prefix: String,
}

impl Default for HostVarProjector {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTVAR_PREFIX)
    }
}

impl HostVarProjector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn var(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// Project one VM from `site_name` into host variables
    pub fn project(&self, vm: &RawVm, site_name: &str, site_url: &str) -> HostVars {
        let mut vars = HostVars::new();

        vars.insert(self.var("site"), Value::from(site_name));
        vars.insert(self.var("site_url"), Value::from(site_url));
        vars.insert(
            self.var("vm_id"),
            vm.field("$key").cloned().unwrap_or(Value::Null),
        );

        for field in PASSTHROUGH_FIELDS {
            vars.insert(self.var(field), vm.field(field).cloned().unwrap_or(Value::Null));
        }

        let enabled = match vm.field("enabled") {
            Some(Value::Null) | None => Value::Bool(true),
            Some(value) => value.clone(),
        };
        vars.insert(self.var("enabled"), enabled);

        vars.insert(
            self.var("tags"),
            Value::Array(vm.tags.iter().cloned().map(Value::String).collect()),
        );

        if !vm.nics.is_empty() {
            let nics = vm
                .nics
                .iter()
                .filter_map(|nic| serde_json::to_value(nic).ok())
                .collect();
            vars.insert(self.var("nics"), Value::Array(nics));

            if let Some(ip) = vm.nics.iter().find_map(|nic| nic.ip_address()) {
                vars.insert(self.var("ip"), Value::from(ip));
            }
        }

        vars.insert(self.var("vm_data"), Value::Object(vm.raw_fields()));

        for name in CONNECTION_VARIABLES {
            vars.remove(name);
        }
        vars
    }
}
