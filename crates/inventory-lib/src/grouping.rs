//! Group assignment along configurable dimensions

use crate::filter::sanitize_group_name;
use crate::inventory::InventoryGraph;
use crate::models::RawVm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Dimension a host can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDimension {
    Site,
    Status,
    Tags,
    Tenant,
    OsFamily,
    Cluster,
}

impl GroupDimension {
    /// Group name prefix for this dimension
    pub fn prefix(&self) -> &'static str {
        match self {
            GroupDimension::Site => "site",
            GroupDimension::Status => "status",
            GroupDimension::Tags => "tag",
            GroupDimension::Tenant => "tenant",
            GroupDimension::OsFamily => "os_family",
            GroupDimension::Cluster => "cluster",
        }
    }

    fn group(&self, raw: &str) -> String {
        format!("{}_{}", self.prefix(), sanitize_group_name(raw))
    }
}

impl fmt::Display for GroupDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupDimension::Site => "site",
            GroupDimension::Status => "status",
            GroupDimension::Tags => "tags",
            GroupDimension::Tenant => "tenant",
            GroupDimension::OsFamily => "os_family",
            GroupDimension::Cluster => "cluster",
        };
        f.write_str(name)
    }
}

/// Default grouping: by site, then by status
pub fn default_group_by() -> Vec<GroupDimension> {
    vec![GroupDimension::Site, GroupDimension::Status]
}

/// Group names a VM belongs to, in dimension order
pub fn group_names(vm: &RawVm, site_name: &str, dimensions: &[GroupDimension]) -> Vec<String> {
    let mut groups = Vec::new();
    for dimension in dimensions {
        match dimension {
            GroupDimension::Site => groups.push(dimension.group(site_name)),
            GroupDimension::Status => {
                groups.push(dimension.group(vm.status().unwrap_or("unknown")))
            }
            GroupDimension::Tags => {
                groups.extend(vm.tags.iter().map(|tag| dimension.group(tag)));
            }
            GroupDimension::Tenant => {
                groups.extend(vm.field("tenant").and_then(group_value).map(|v| dimension.group(&v)))
            }
            GroupDimension::OsFamily => groups.extend(
                vm.field("os_family")
                    .and_then(group_value)
                    .map(|v| dimension.group(&v)),
            ),
            GroupDimension::Cluster => {
                groups.extend(vm.field("cluster").and_then(group_value).map(|v| dimension.group(&v)))
            }
        }
    }
    groups
}

/// Add a host to every group it belongs to, creating groups as needed.
///
/// Returns the groups the host was placed in.
pub fn assign_groups(
    graph: &mut InventoryGraph,
    hostname: &str,
    vm: &RawVm,
    site_name: &str,
    dimensions: &[GroupDimension],
) -> Vec<String> {
    let groups = group_names(vm, site_name, dimensions);
    for group in &groups {
        graph.add_group(group);
        // The host was added by the caller; a missing host only skips membership.
        let _ = graph.add_child(group, hostname);
    }
    groups
}

/// Render an organization field for a group name; empty values yield no group
fn group_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}
