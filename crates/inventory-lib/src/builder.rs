//! Inventory build pipeline
//!
//! Fetch every site concurrently, then populate the graph single-threaded:
//! filter, resolve the hostname, project variables, assign groups and run
//! post-processing hooks. A cache store can short-circuit the whole
//! pipeline.

use crate::client::SiteConnector;
use crate::config::InventoryConfig;
use crate::error::{ConfigError, HookError, InventoryError};
use crate::fetch::SiteFetcher;
use crate::filter::{resolve_hostname, VmFilter};
use crate::grouping::assign_groups;
use crate::hooks::{HostHook, KeyedGroupHook};
use crate::hostvars::HostVarProjector;
use crate::inventory::{CacheStore, HostVars, InventoryGraph};
use crate::models::SiteResult;
use crate::observability::{InventoryLogger, InventoryMetrics};
use std::sync::Arc;
use tracing::debug;

/// Counters from one population pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateStats {
    pub sites_ok: usize,
    pub sites_failed: usize,
    pub hosts_added: usize,
    pub vms_filtered: usize,
    pub duplicate_hosts: usize,
    pub hook_errors: usize,
}

/// Where a built inventory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSource {
    Cache,
    Fetched,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: InventoryGraph,
    pub source: BuildSource,
    /// Empty when served from cache
    pub site_results: Vec<SiteResult>,
}

pub struct InventoryBuilder {
    config: InventoryConfig,
    fetcher: SiteFetcher,
    filter: VmFilter,
    projector: HostVarProjector,
    hooks: Vec<Box<dyn HostHook>>,
    metrics: InventoryMetrics,
    logger: InventoryLogger,
}

impl InventoryBuilder {
    /// Validate the configuration and prepare the pipeline.
    ///
    /// `keyed_groups` entries become [`KeyedGroupHook`]s, run in order.
    pub fn new(
        config: InventoryConfig,
        connector: Arc<dyn SiteConnector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let filter = config.vm_filter()?;
        let projector = config.projector();
        let fetcher = SiteFetcher::new(connector, config.fetch_options());
        let hooks = config
            .keyed_groups
            .iter()
            .cloned()
            .map(|keyed| Box::new(KeyedGroupHook::new(keyed)) as Box<dyn HostHook>)
            .collect();

        Ok(Self {
            config,
            fetcher,
            filter,
            projector,
            hooks,
            metrics: InventoryMetrics::new(),
            logger: InventoryLogger::new(),
        })
    }

    /// Append a post-processing hook
    pub fn with_hook(mut self, hook: Box<dyn HostHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Fetch all configured sites and populate `graph`.
    ///
    /// Returns every site's result, failed sites included.
    pub async fn fetch_and_populate(
        &self,
        graph: &mut InventoryGraph,
    ) -> Result<Vec<SiteResult>, InventoryError> {
        let results = self.fetcher.fetch_all(&self.config.sites).await;
        self.populate(graph, &results)?;
        Ok(results)
    }

    /// Add the VMs of every successful site to `graph`
    pub fn populate(
        &self,
        graph: &mut InventoryGraph,
        results: &[SiteResult],
    ) -> Result<PopulateStats, InventoryError> {
        let mut stats = PopulateStats::default();

        for result in results {
            if !result.is_ok() {
                stats.sites_failed += 1;
                continue;
            }
            stats.sites_ok += 1;

            for vm in &result.vms {
                if !self.filter.should_include(vm) {
                    stats.vms_filtered += 1;
                    continue;
                }

                let hostname = resolve_hostname(vm, &result.site, &self.config.hostname_template);
                if graph.add_host(&hostname) {
                    stats.hosts_added += 1;
                } else {
                    stats.duplicate_hosts += 1;
                    self.logger.log_duplicate_host(&hostname, &result.site);
                }

                let vars = self.projector.project(vm, &result.site, &result.site_url);
                graph.set_variables(&hostname, vars.clone())?;
                let groups = assign_groups(graph, &hostname, vm, &result.site, &self.config.group_by);
                debug!(host = %hostname, groups = ?groups, "Host populated");

                if let Err(source) = self.run_hooks(&hostname, &vars, graph) {
                    if self.config.strict {
                        return Err(InventoryError::Hook {
                            host: hostname,
                            source,
                        });
                    }
                    stats.hook_errors += 1;
                    self.metrics.inc_hook_errors();
                    self.logger.log_host_skipped(&hostname, &source.to_string());
                }
            }
        }

        self.metrics.set_hosts_populated(graph.host_count());
        self.logger.log_populated(
            graph.host_count(),
            graph.group_names().count(),
            stats.sites_ok,
            stats.sites_failed,
        );
        Ok(stats)
    }

    /// Run hooks in order, stopping at the first failure for this host
    fn run_hooks(
        &self,
        hostname: &str,
        vars: &HostVars,
        graph: &mut InventoryGraph,
    ) -> Result<(), HookError> {
        for hook in &self.hooks {
            debug!(host = %hostname, hook = hook.name(), "Running host hook");
            hook.apply(hostname, vars, graph)?;
        }
        Ok(())
    }

    /// Build the inventory, consulting `cache` first unless `refresh` is set.
    ///
    /// A fetched inventory is written back to the cache.
    pub async fn build(
        &self,
        cache: Option<&CacheStore>,
        cache_key: &str,
        refresh: bool,
    ) -> Result<BuildOutcome, InventoryError> {
        if let Some(store) = cache {
            if !refresh {
                if let Some(record) = store.load(cache_key) {
                    self.metrics.inc_cache_hits();
                    self.logger.log_cache(cache_key, true);
                    return Ok(BuildOutcome {
                        graph: InventoryGraph::from_cache(&record),
                        source: BuildSource::Cache,
                        site_results: Vec::new(),
                    });
                }
            }
            self.metrics.inc_cache_misses();
            self.logger.log_cache(cache_key, false);
        }

        let mut graph = InventoryGraph::new();
        let site_results = self.fetch_and_populate(&mut graph).await?;

        if let Some(store) = cache {
            store.save(cache_key, &graph.serialize_cache())?;
        }

        Ok(BuildOutcome {
            graph,
            source: BuildSource::Fetched,
            site_results,
        })
    }
}
