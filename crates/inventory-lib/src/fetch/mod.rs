//! Bounded-concurrency fetch across VergeOS sites
//!
//! Every configured site is dispatched as its own task. A semaphore caps
//! the number of sites in flight at `max_workers`, and each site carries
//! its own `site_timeout` budget starting when it gets a worker slot.
//! Results are collected over a channel in completion order, one per site.

mod join;

#[cfg(test)]
mod tests;

pub use join::{fetch_site, join_site_records};

use crate::client::SiteConnector;
use crate::error::ClientError;
use crate::models::{SiteConfig, SiteResult};
use crate::observability::{InventoryLogger, InventoryMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

/// Default maximum number of concurrently fetched sites
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Default per-site wall-clock budget in seconds
pub const DEFAULT_SITE_TIMEOUT_SECS: u64 = 60;

/// Bounds for a multi-site fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of sites fetched at once
    pub max_workers: usize,
    /// Wall-clock budget for one site's fetch
    pub site_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            site_timeout: Duration::from_secs(DEFAULT_SITE_TIMEOUT_SECS),
        }
    }
}

/// Fetches VMs from many sites concurrently
pub struct SiteFetcher {
    connector: Arc<dyn SiteConnector>,
    options: FetchOptions,
    metrics: InventoryMetrics,
    logger: InventoryLogger,
}

impl SiteFetcher {
    pub fn new(connector: Arc<dyn SiteConnector>, options: FetchOptions) -> Self {
        Self {
            connector,
            options,
            metrics: InventoryMetrics::new(),
            logger: InventoryLogger::new(),
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch all sites, producing exactly one result per site.
    ///
    /// Output order is completion order and must not be relied upon.
    pub async fn fetch_all(&self, sites: &[SiteConfig]) -> Vec<SiteResult> {
        if sites.is_empty() {
            return Vec::new();
        }

        info!(
            sites = sites.len(),
            max_workers = self.options.max_workers,
            site_timeout = ?self.options.site_timeout,
            "Fetching VMs from sites"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, SiteResult)>(sites.len());

        for (index, site) in sites.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let connector = Arc::clone(&self.connector);
            let result_tx = result_tx.clone();
            let site_timeout = self.options.site_timeout;
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let start = Instant::now();
                let result =
                    match tokio::time::timeout(site_timeout, fetch_site(connector.as_ref(), &site))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => SiteResult::failure(
                            &site,
                            ClientError::Timeout(site_timeout).to_string(),
                        ),
                    };
                metrics.observe_site_fetch(start.elapsed().as_secs_f64(), result.is_ok());

                let _ = result_tx.send((index, result)).await;
            });
        }
        drop(result_tx);

        let mut received = vec![false; sites.len()];
        let mut results = Vec::with_capacity(sites.len());
        while let Some((index, result)) = result_rx.recv().await {
            received[index] = true;
            self.report(&result);
            results.push(result);
        }

        // A task that panicked never reports; account for its site anyway.
        for (index, site) in sites.iter().enumerate() {
            if !received[index] {
                let result = SiteResult::failure(site, "Site fetch task aborted unexpectedly");
                self.metrics.observe_site_fetch(0.0, false);
                self.report(&result);
                results.push(result);
            }
        }

        results
    }

    fn report(&self, result: &SiteResult) {
        match &result.error {
            Some(error) => self.logger.log_site_failed(&result.site, &result.site_url, error),
            None => {
                debug!(site = %result.site, vms = result.vms.len(), "Site fetch complete");
                self.logger.log_site_fetched(&result.site, result.vms.len());
            }
        }
    }
}
