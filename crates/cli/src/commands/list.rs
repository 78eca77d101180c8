//! Host listing commands

use anyhow::Result;
use colored::Colorize;
use inventory_lib::{HostVars, InventoryError};
use serde_json::{json, Value};
use tabled::Tabled;

use super::{build_inventory, note_source};
use crate::config::InventorySource;
use crate::output::{color_status, print_json, print_table, truncate, OutputFormat};

/// Row for hosts table
#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Groups")]
    groups: String,
}

/// Row for host variables table
#[derive(Tabled)]
struct VarRow {
    #[tabled(rename = "Variable")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn var<'a>(vars: &'a HostVars, prefix: &str, name: &str) -> Option<&'a Value> {
    vars.get(&format!("{prefix}{name}"))
}

/// `--list`: the whole inventory in Ansible's dynamic inventory format
pub async fn print_ansible_list(source: &InventorySource, refresh: bool) -> Result<()> {
    let outcome = build_inventory(source, refresh).await?;
    print_json(&outcome.graph.to_ansible_json())
}

/// `--host`: one host's variables, `{}` for unknown hosts
pub async fn print_ansible_host(source: &InventorySource, host: &str, refresh: bool) -> Result<()> {
    let outcome = build_inventory(source, refresh).await?;
    match outcome.graph.host_vars(host) {
        Some(vars) => print_json(vars),
        None => print_json(&json!({})),
    }
}

/// List all hosts
pub async fn list_hosts(source: &InventorySource, refresh: bool, format: OutputFormat) -> Result<()> {
    let outcome = build_inventory(source, refresh).await?;
    let graph = &outcome.graph;

    match format {
        OutputFormat::Json => print_json(&graph.to_ansible_json())?,
        OutputFormat::Table => {
            note_source(&outcome);
            let prefix = &source.config().hostvar_prefix;
            let rows: Vec<HostRow> = graph
                .host_names()
                .filter_map(|host| {
                    let vars = graph.host_vars(host)?;
                    Some(HostRow {
                        host: host.to_string(),
                        site: render(var(vars, prefix, "site")),
                        status: color_status(&render(var(vars, prefix, "status"))),
                        ip: render(var(vars, prefix, "ip")),
                        groups: truncate(&graph.host_groups(host).join(", "), 60),
                    })
                })
                .collect();

            print_table(&rows, "No hosts found");
            println!(
                "\n{} hosts, {} groups",
                graph.host_count().to_string().bold(),
                graph.group_names().count().to_string().bold()
            );
        }
    }

    Ok(())
}

/// Show one host's groups and variables
pub async fn show_host(
    source: &InventorySource,
    name: &str,
    refresh: bool,
    format: OutputFormat,
) -> Result<()> {
    let outcome = build_inventory(source, refresh).await?;
    let graph = &outcome.graph;
    let vars = graph
        .host_vars(name)
        .ok_or_else(|| InventoryError::UnknownHost(name.to_string()))?;
    let groups = graph.host_groups(name);

    match format {
        OutputFormat::Json => print_json(&json!({
            "host": name,
            "groups": groups,
            "vars": vars,
        }))?,
        OutputFormat::Table => {
            note_source(&outcome);
            println!("{} {}", "Host:".bold(), name.cyan());
            println!("{} {}", "Groups:".bold(), groups.join(", "));
            println!();

            let rows: Vec<VarRow> = vars
                .iter()
                .map(|(name, value)| VarRow {
                    name: name.clone(),
                    value: truncate(&render(Some(value)), 80),
                })
                .collect();
            print_table(&rows, "No variables");
        }
    }

    Ok(())
}
