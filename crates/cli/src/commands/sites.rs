//! Site status command

use anyhow::Result;
use colored::Colorize;
use inventory_lib::{InventoryGraph, SiteResult};
use serde::Serialize;
use tabled::Tabled;

use crate::config::InventorySource;
use crate::output::{color_status, print_json, print_table, print_warning, truncate, OutputFormat};

/// Row for sites table
#[derive(Tabled, Serialize)]
struct SiteRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "VMs")]
    vms: usize,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn status_label(result: &SiteResult) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

/// Fetch every site, bypassing the cache, and report each outcome
pub async fn show_sites(source: &InventorySource, format: OutputFormat) -> Result<()> {
    let builder = source.builder()?;
    let mut graph = InventoryGraph::new();
    let mut results = builder.fetch_and_populate(&mut graph).await?;
    results.sort_by(|a, b| a.site.cmp(&b.site));

    match format {
        OutputFormat::Json => {
            let rows: Vec<SiteRow> = results
                .iter()
                .map(|r| SiteRow {
                    site: r.site.clone(),
                    url: r.site_url.clone(),
                    vms: r.vms.len(),
                    status: status_label(r).to_string(),
                    error: r.error.clone().unwrap_or_default(),
                })
                .collect();
            print_json(&rows)?;
        }
        OutputFormat::Table => {
            let rows: Vec<SiteRow> = results
                .iter()
                .map(|r| SiteRow {
                    site: r.site.clone(),
                    url: r.site_url.clone(),
                    vms: r.vms.len(),
                    status: color_status(status_label(r)),
                    error: truncate(r.error.as_deref().unwrap_or("-"), 60),
                })
                .collect();
            print_table(&rows, "No sites configured");

            let failed = results.iter().filter(|r| !r.is_ok()).count();
            if failed > 0 {
                print_warning(&format!("{} of {} sites failed", failed, results.len()));
            } else {
                println!(
                    "\n{} sites, {} hosts",
                    results.len().to_string().bold(),
                    graph.host_count().to_string().bold()
                );
            }
        }
    }

    Ok(())
}
