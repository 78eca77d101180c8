//! VergeOS inventory CLI
//!
//! Works as an Ansible script inventory (`--list`, `--host <name>`) and as
//! an operator tool for inspecting hosts, site health and the cache.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cache, list, sites};
use inventory_lib::InventoryMetrics;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// VergeOS dynamic inventory
#[derive(Parser)]
#[command(name = "vergeos-inventory")]
#[command(author, version, about = "Dynamic Ansible inventory for VergeOS VMs across multiple sites", long_about = None)]
pub struct Cli {
    /// Inventory source file (*.vergeos_vms.yml or *.vergeos_vms.yaml)
    #[arg(long, short, env = "VERGEOS_INVENTORY_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Ignore any cached inventory and fetch from all sites
    #[arg(long)]
    pub refresh_cache: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,

    /// Print the full inventory as Ansible JSON
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Print one host's variables as Ansible JSON
    #[arg(long)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List inventory hosts
    List,

    /// Show one host's variables and groups
    Host {
        /// Inventory hostname
        name: String,
    },

    /// Fetch every site and show its status
    Sites,

    /// Manage the inventory cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove the cached inventory for this source
    Clear,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    debug!(config = %cli.config.display(), "Loading inventory source");
    let source = config::InventorySource::load(&cli.config)?;

    if cli.list {
        list::print_ansible_list(&source, cli.refresh_cache).await?;
    } else if let Some(host) = &cli.host {
        list::print_ansible_host(&source, host, cli.refresh_cache).await?;
    } else {
        match cli.command.unwrap_or(Commands::List) {
            Commands::List => {
                list::list_hosts(&source, cli.refresh_cache, cli.format).await?;
            }
            Commands::Host { name } => {
                list::show_host(&source, &name, cli.refresh_cache, cli.format).await?;
            }
            Commands::Sites => {
                sites::show_sites(&source, cli.format).await?;
            }
            Commands::Cache(CacheCommands::Clear) => {
                cache::clear_cache(&source)?;
            }
        }
    }

    if cli.metrics {
        eprint!("{}", InventoryMetrics::new().render());
    }

    Ok(())
}
