//! Observability infrastructure for the inventory pipeline
//!
//! Provides:
//! - Prometheus metrics (site fetch latency, site outcomes, hosts, cache use)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for site fetch latency (in seconds)
const FETCH_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InventoryMetricsInner> = OnceLock::new();

struct InventoryMetricsInner {
    site_fetch_latency_seconds: Histogram,
    sites_succeeded: IntCounter,
    sites_failed: IntCounter,
    hosts_populated: IntGauge,
    hook_errors: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
}

impl InventoryMetricsInner {
    fn new() -> Self {
        Self {
            site_fetch_latency_seconds: register_histogram!(
                "vergeos_inventory_site_fetch_latency_seconds",
                "Time spent fetching and joining one site's VMs",
                FETCH_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register site_fetch_latency_seconds"),

            sites_succeeded: register_int_counter!(
                "vergeos_inventory_sites_succeeded_total",
                "Number of site fetches that returned VMs"
            )
            .expect("Failed to register sites_succeeded"),

            sites_failed: register_int_counter!(
                "vergeos_inventory_sites_failed_total",
                "Number of site fetches that failed or timed out"
            )
            .expect("Failed to register sites_failed"),

            hosts_populated: register_int_gauge!(
                "vergeos_inventory_hosts",
                "Number of hosts in the last built inventory"
            )
            .expect("Failed to register hosts_populated"),

            hook_errors: register_int_counter!(
                "vergeos_inventory_hook_errors_total",
                "Number of post-processing hook failures"
            )
            .expect("Failed to register hook_errors"),

            cache_hits: register_int_counter!(
                "vergeos_inventory_cache_hits_total",
                "Number of inventory builds served from cache"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "vergeos_inventory_cache_misses_total",
                "Number of inventory builds that missed the cache"
            )
            .expect("Failed to register cache_misses"),
        }
    }
}

/// Inventory metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct InventoryMetrics {
    _private: (),
}

impl Default for InventoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InventoryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InventoryMetricsInner {
        GLOBAL_METRICS.get_or_init(InventoryMetricsInner::new)
    }

    /// Record one finished site fetch
    pub fn observe_site_fetch(&self, duration_secs: f64, succeeded: bool) {
        self.inner().site_fetch_latency_seconds.observe(duration_secs);
        if succeeded {
            self.inner().sites_succeeded.inc();
        } else {
            self.inner().sites_failed.inc();
        }
    }

    pub fn set_hosts_populated(&self, count: usize) {
        self.inner().hosts_populated.set(count as i64);
    }

    pub fn inc_hook_errors(&self) {
        self.inner().hook_errors.inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses.inc();
    }

    pub fn sites_failed(&self) -> u64 {
        self.inner().sites_failed.get()
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for inventory events
///
/// Operator-visible warnings (degraded sites, skipped hosts) and
/// informational build events share consistent field names.
#[derive(Clone, Default)]
pub struct InventoryLogger;

impl InventoryLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_site_fetched(&self, site: &str, vm_count: usize) {
        info!(
            event = "site_fetched",
            site = %site,
            vms = vm_count,
            "Fetched VMs from site"
        );
    }

    pub fn log_site_failed(&self, site: &str, site_url: &str, error: &str) {
        warn!(
            event = "site_failed",
            site = %site,
            site_url = %site_url,
            error = %error,
            "Site returned error"
        );
    }

    pub fn log_host_skipped(&self, host: &str, error: &str) {
        warn!(
            event = "host_hook_failed",
            host = %host,
            error = %error,
            "Error processing host"
        );
    }

    pub fn log_duplicate_host(&self, host: &str, site: &str) {
        warn!(
            event = "duplicate_host",
            host = %host,
            site = %site,
            "Hostname already present, overwriting variables"
        );
    }

    pub fn log_populated(&self, hosts: usize, groups: usize, sites_ok: usize, sites_failed: usize) {
        info!(
            event = "inventory_populated",
            hosts = hosts,
            groups = groups,
            sites_ok = sites_ok,
            sites_failed = sites_failed,
            "Inventory populated"
        );
    }

    pub fn log_cache(&self, key: &str, hit: bool) {
        let event = if hit { "cache_hit" } else { "cache_miss" };
        info!(
            event = event,
            cache_key = %key,
            "Inventory cache lookup"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_state() {
        let a = InventoryMetrics::new();
        let b = a.clone();

        let before = b.sites_failed();
        a.observe_site_fetch(0.2, false);
        assert!(b.sites_failed() >= before + 1);
    }

    #[test]
    fn test_render_contains_metric_names() {
        let metrics = InventoryMetrics::new();
        metrics.observe_site_fetch(0.1, true);
        metrics.inc_cache_misses();

        let text = metrics.render();
        assert!(text.contains("vergeos_inventory_site_fetch_latency_seconds"));
        assert!(text.contains("vergeos_inventory_cache_misses_total"));
    }
}
