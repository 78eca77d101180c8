//! Post-processing hooks run per host after projection and grouping

use crate::config::KeyedGroupConfig;
use crate::error::HookError;
use crate::filter::sanitize_group_name;
use crate::inventory::{HostVars, InventoryGraph};
use serde_json::Value;

/// A per-host post-processing step.
///
/// Invoked once for every populated host with that host's projected
/// variables. Errors are isolated per host unless the inventory is strict.
pub trait HostHook: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        hostname: &str,
        vars: &HostVars,
        graph: &mut InventoryGraph,
    ) -> Result<(), HookError>;
}

/// Places hosts into groups named after the value of a host variable
#[derive(Debug, Clone)]
pub struct KeyedGroupHook {
    config: KeyedGroupConfig,
}

impl KeyedGroupHook {
    pub fn new(config: KeyedGroupConfig) -> Self {
        Self { config }
    }

    fn group_name(&self, value: &str) -> String {
        if self.config.prefix.is_empty() {
            sanitize_group_name(value)
        } else {
            sanitize_group_name(&format!(
                "{}{}{}",
                self.config.prefix, self.config.separator, value
            ))
        }
    }

    /// Group names derived from one variable value
    fn group_names(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.group_name(&render(item)))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| {
                    let entry = format!("{}{}{}", k, self.config.separator, render(v));
                    self.group_name(&entry)
                })
                .collect(),
            scalar => vec![self.group_name(&render(scalar))],
        }
    }
}

impl HostHook for KeyedGroupHook {
    fn name(&self) -> &str {
        "keyed_groups"
    }

    fn apply(
        &self,
        hostname: &str,
        vars: &HostVars,
        graph: &mut InventoryGraph,
    ) -> Result<(), HookError> {
        let value = match vars.get(&self.config.key) {
            Some(Value::Null) | None => match &self.config.default_value {
                Some(default) => default,
                None => return Err(HookError::MissingVariable(self.config.key.clone())),
            },
            Some(value) => value,
        };

        for group in self.group_names(value) {
            if group.is_empty() {
                continue;
            }
            graph.add_group(&group);
            graph
                .add_child(&group, hostname)
                .map_err(|e| HookError::Other(e.to_string()))?;
        }
        Ok(())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
