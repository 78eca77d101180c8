//! End-to-end tests for the inventory build pipeline

use inventory_lib::client::{async_trait, ConnectParams, SiteClient, SiteConnector};
use inventory_lib::{
    BuildSource, CacheStore, ClientError, InventoryBuilder, InventoryConfig, InventoryError, Nic,
    RawVm, Tag, TagMembership,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// In-memory connector serving fixed VM lists keyed by bare host
#[derive(Default)]
struct StaticConnector {
    sites: HashMap<String, StaticSite>,
    connects: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
struct StaticSite {
    vms: Vec<RawVm>,
    tags: Vec<Tag>,
    memberships: Vec<TagMembership>,
    nics: Vec<Nic>,
}

impl StaticConnector {
    fn with_site(mut self, host: &str, vms: Vec<RawVm>) -> Self {
        self.sites.insert(
            host.to_string(),
            StaticSite {
                vms,
                ..Default::default()
            },
        );
        self
    }

    fn with_full_site(mut self, host: &str, site: StaticSite) -> Self {
        self.sites.insert(host.to_string(), site);
        self
    }
}

#[async_trait]
impl SiteConnector for StaticConnector {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn SiteClient>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.sites
            .get(&params.host)
            .cloned()
            .map(|site| Arc::new(site) as Arc<dyn SiteClient>)
            .ok_or_else(|| ClientError::Connection(format!("{} unreachable", params.host)))
    }
}

#[async_trait]
impl SiteClient for StaticSite {
    async fn list_vms(&self) -> Result<Vec<RawVm>, ClientError> {
        Ok(self.vms.clone())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ClientError> {
        Ok(self.tags.clone())
    }

    async fn list_tag_memberships(&self) -> Result<Vec<TagMembership>, ClientError> {
        Ok(self.memberships.clone())
    }

    async fn list_nics(&self) -> Result<Vec<Nic>, ClientError> {
        Ok(self.nics.clone())
    }
}

fn config(extra: &str) -> InventoryConfig {
    let text = format!(
        r#"
plugin: vergeos_vms
sites:
  - name: denver
    host: https://denver.vergeos.local
    api_key: token-denver
  - name: chicago
    host: chicago.vergeos.local
    username: admin
    password: secret
{extra}"#
    );
    InventoryConfig::from_yaml(&text).unwrap()
}

fn two_sites() -> StaticConnector {
    StaticConnector::default()
        .with_site(
            "denver.vergeos.local",
            vec![RawVm::new(1, "web01").with_status("running")],
        )
        .with_site(
            "chicago.vergeos.local",
            vec![RawVm::new(1, "db01").with_status("stopped")],
        )
}

#[tokio::test]
async fn test_stopped_vms_excluded_across_sites() {
    let builder =
        InventoryBuilder::new(config("include_stopped: false\n"), Arc::new(two_sites())).unwrap();

    let outcome = builder.build(None, "unused", false).await.unwrap();
    let graph = outcome.graph;

    assert_eq!(outcome.source, BuildSource::Fetched);
    assert_eq!(outcome.site_results.len(), 2);
    assert_eq!(graph.host_names().collect::<Vec<_>>(), vec!["denver_web01"]);
    assert_eq!(graph.group_hosts("site_denver"), vec!["denver_web01"]);
    assert_eq!(graph.group_hosts("status_running"), vec!["denver_web01"]);
    assert!(!graph.contains_group("site_chicago"));

    let vars = graph.host_vars("denver_web01").unwrap();
    assert_eq!(vars["vergeos_site"], json!("denver"));
    assert_eq!(vars["vergeos_site_url"], json!("https://denver.vergeos.local"));
}

#[tokio::test]
async fn test_failed_site_contributes_no_hosts() {
    let connector = StaticConnector::default().with_site(
        "denver.vergeos.local",
        vec![RawVm::new(1, "web01").with_status("running")],
    );
    let builder = InventoryBuilder::new(config(""), Arc::new(connector)).unwrap();

    let outcome = builder.build(None, "unused", false).await.unwrap();

    let chicago = outcome
        .site_results
        .iter()
        .find(|r| r.site == "chicago")
        .unwrap();
    assert!(chicago.error.as_deref().unwrap().starts_with("Connection failed"));
    assert_eq!(outcome.graph.host_count(), 1);
    assert!(outcome.graph.host_names().all(|h| h.starts_with("denver_")));
}

#[tokio::test]
async fn test_joined_tags_and_nics_reach_inventory() {
    let site = StaticSite {
        vms: vec![RawVm::new(34, "web01").with_status("running").with_machine(100)],
        tags: vec![Tag {
            id: 7,
            name: "Production".into(),
        }],
        memberships: vec![TagMembership::new(7, "vms/34")],
        nics: vec![Nic::new(100).with_field("ipaddress", "10.0.0.34")],
    };
    let connector = StaticConnector::default().with_full_site("denver.vergeos.local", site);
    let builder = InventoryBuilder::new(
        config("group_by: [site, tags]\n"),
        Arc::new(connector),
    )
    .unwrap();

    let graph = builder.build(None, "unused", false).await.unwrap().graph;

    assert_eq!(graph.group_hosts("tag_production"), vec!["denver_web01"]);
    let vars = graph.host_vars("denver_web01").unwrap();
    assert_eq!(vars["vergeos_tags"], json!(["Production"]));
    assert_eq!(vars["vergeos_ip"], json!("10.0.0.34"));
    assert!(!vars.contains_key("ansible_host"));
}

#[tokio::test]
async fn test_cache_hit_skips_sites() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::new(dir.path(), Duration::from_secs(300));
    let connector = Arc::new(two_sites());
    let connects = Arc::clone(&connector.connects);
    let builder = InventoryBuilder::new(config(""), connector).unwrap();

    let fresh = builder.build(Some(&store), "prod", false).await.unwrap();
    assert_eq!(fresh.source, BuildSource::Fetched);
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    let cached = builder.build(Some(&store), "prod", false).await.unwrap();
    assert_eq!(cached.source, BuildSource::Cache);
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert!(cached.site_results.is_empty());
    assert_eq!(cached.graph, fresh.graph);
    assert_eq!(cached.graph.to_ansible_json(), fresh.graph.to_ansible_json());

    let refreshed = builder.build(Some(&store), "prod", true).await.unwrap();
    assert_eq!(refreshed.source, BuildSource::Fetched);
    assert_eq!(connects.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_hook_errors_skip_host_unless_strict() {
    let keyed = "keyed_groups:\n  - key: vergeos_owner\n    prefix: owner\n";

    let lenient = InventoryBuilder::new(config(keyed), Arc::new(two_sites())).unwrap();
    let outcome = lenient.build(None, "unused", false).await.unwrap();
    assert_eq!(outcome.graph.host_count(), 2);

    let strict = InventoryBuilder::new(
        config(&format!("{keyed}strict: true\n")),
        Arc::new(two_sites()),
    )
    .unwrap();
    let err = strict.build(None, "unused", false).await.unwrap_err();
    match err {
        InventoryError::Hook { host, .. } => {
            assert!(host == "denver_web01" || host == "chicago_db01")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_keyed_groups_from_host_vars() {
    let keyed = "keyed_groups:\n  - key: vergeos_status\n    prefix: power\n";
    let builder = InventoryBuilder::new(config(keyed), Arc::new(two_sites())).unwrap();

    let graph = builder.build(None, "unused", false).await.unwrap().graph;

    assert_eq!(graph.group_hosts("power_running"), vec!["denver_web01"]);
    assert_eq!(graph.group_hosts("power_stopped"), vec!["chicago_db01"]);
}

#[tokio::test]
async fn test_duplicate_hostnames_collapse() {
    let connector = StaticConnector::default()
        .with_site("denver.vergeos.local", vec![RawVm::new(1, "web01")])
        .with_site("chicago.vergeos.local", vec![RawVm::new(2, "web01")]);
    let builder = InventoryBuilder::new(
        config("hostname_template: \"{name}\"\n"),
        Arc::new(connector),
    )
    .unwrap();

    let graph = builder.build(None, "unused", false).await.unwrap().graph;

    assert_eq!(graph.host_count(), 1);
    assert_eq!(graph.host_groups("web01").len(), 3);
}
