//! Tests for the site fetcher
//!
//! These tests use an in-memory connector to exercise joins, failure
//! isolation, timeouts and the worker bound without a real VergeOS API.

use super::*;
use crate::client::{async_trait, ConnectParams, SiteClient};
use crate::models::{Credential, Nic, RawVm, Tag, TagMembership};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, PartialEq)]
enum Failure {
    Auth,
    Connect,
}

#[derive(Clone, Default)]
struct MockSite {
    vms: Vec<RawVm>,
    tags: Vec<Tag>,
    memberships: Vec<TagMembership>,
    nics: Vec<Nic>,
    connect_failure: Option<Failure>,
    hang: bool,
    fail_auxiliary: bool,
}

#[derive(Default)]
struct MockConnector {
    sites: HashMap<String, MockSite>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    seen: Mutex<Vec<ConnectParams>>,
}

impl MockConnector {
    fn with_site(mut self, host: &str, site: MockSite) -> Self {
        self.sites.insert(host.to_string(), site);
        self
    }
}

struct MockClient {
    site: MockSite,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl SiteConnector for MockConnector {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn SiteClient>, ClientError> {
        self.seen.lock().unwrap().push(params.clone());
        let site = self
            .sites
            .get(&params.host)
            .cloned()
            .ok_or_else(|| ClientError::Connection(format!("unknown host {}", params.host)))?;

        match site.connect_failure {
            Some(Failure::Auth) => Err(ClientError::Authentication("invalid credentials".into())),
            Some(Failure::Connect) => Err(ClientError::Connection("connection refused".into())),
            None => Ok(Arc::new(MockClient {
                site,
                delay: self.delay,
                in_flight: Arc::clone(&self.in_flight),
                peak: Arc::clone(&self.peak),
            })),
        }
    }
}

#[async_trait]
impl SiteClient for MockClient {
    async fn list_vms(&self) -> Result<Vec<RawVm>, ClientError> {
        if self.site.hang {
            std::future::pending::<()>().await;
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.site.vms.clone())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ClientError> {
        if self.site.fail_auxiliary {
            return Err(ClientError::Api {
                status: 404,
                message: "not found".into(),
            });
        }
        Ok(self.site.tags.clone())
    }

    async fn list_tag_memberships(&self) -> Result<Vec<TagMembership>, ClientError> {
        if self.site.fail_auxiliary {
            return Err(ClientError::Connection("reset".into()));
        }
        Ok(self.site.memberships.clone())
    }

    async fn list_nics(&self) -> Result<Vec<Nic>, ClientError> {
        if self.site.fail_auxiliary {
            return Err(ClientError::Decode("bad json".into()));
        }
        Ok(self.site.nics.clone())
    }
}

fn site(name: &str) -> SiteConfig {
    SiteConfig::with_password(name, format!("{name}.vergeos.local"), "admin", "secret")
}

fn simple_site(vm_name: &str) -> MockSite {
    MockSite {
        vms: vec![RawVm::new(1, vm_name).with_status("running")],
        ..Default::default()
    }
}

fn fetcher(connector: MockConnector, max_workers: usize, site_timeout: Duration) -> SiteFetcher {
    SiteFetcher::new(
        Arc::new(connector),
        FetchOptions {
            max_workers,
            site_timeout,
        },
    )
}

mod join_tests {
    use super::*;

    #[test]
    fn test_tags_and_nics_joined() {
        let vms = vec![
            RawVm::new(34, "web01").with_machine(100),
            RawVm::new(35, "db01").with_machine(101),
        ];
        let tags = vec![
            Tag { id: 1, name: "prod".into() },
            Tag { id: 2, name: "web".into() },
        ];
        let memberships = vec![
            TagMembership::new(1, "vms/34"),
            TagMembership::new(2, "vms/34"),
            TagMembership::new(1, "vms/35"),
        ];
        let nics = vec![
            Nic::new(100).with_field("ipaddress", "10.0.0.10"),
            Nic::new(101).with_field("name", "nic0"),
            Nic::new(101).with_field("name", "nic1"),
        ];

        let joined = join_site_records(vms, &tags, &memberships, nics);

        assert_eq!(joined[0].tags, vec!["prod", "web"]);
        assert_eq!(joined[1].tags, vec!["prod"]);
        assert_eq!(joined[0].nics.len(), 1);
        assert_eq!(joined[1].nics.len(), 2);
    }

    #[test]
    fn test_unmatched_rows_skipped() {
        let vms = vec![RawVm::new(1, "web01").with_machine(10), RawVm::new(2, "nomachine")];
        let tags = vec![Tag { id: 1, name: "prod".into() }];
        let memberships = vec![
            TagMembership::new(1, "vnets/1"),
            TagMembership::new(9, "vms/1"),
            TagMembership::new(1, "vms/99"),
            TagMembership::new(1, "vms/not-a-number"),
        ];
        let nics = vec![Nic::new(999), Nic::default()];

        let joined = join_site_records(vms, &tags, &memberships, nics);

        assert!(joined.iter().all(|vm| vm.tags.is_empty()));
        assert!(joined.iter().all(|vm| vm.nics.is_empty()));
    }
}

mod site_fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_fetch_joins_records() {
        let mock = MockSite {
            vms: vec![RawVm::new(34, "web01").with_machine(100)],
            tags: vec![Tag { id: 5, name: "prod".into() }],
            memberships: vec![TagMembership::new(5, "vms/34")],
            nics: vec![Nic::new(100).with_field("ip_address", "192.168.1.5")],
            ..Default::default()
        };
        let connector = MockConnector::default().with_site("denver.vergeos.local", mock);

        let result = fetch_site(&connector, &site("denver")).await;

        assert!(result.is_ok());
        assert_eq!(result.site, "denver");
        assert_eq!(result.site_url, "denver.vergeos.local");
        assert_eq!(result.vms[0].tags, vec!["prod"]);
        assert_eq!(result.vms[0].nics[0].ip_address(), Some("192.168.1.5"));
    }

    #[tokio::test]
    async fn test_auxiliary_failures_do_not_fail_site() {
        let mock = MockSite {
            fail_auxiliary: true,
            ..simple_site("web01")
        };
        let connector = MockConnector::default().with_site("denver.vergeos.local", mock);

        let result = fetch_site(&connector, &site("denver")).await;

        assert!(result.is_ok());
        assert_eq!(result.vms.len(), 1);
        assert!(result.vms[0].tags.is_empty());
        assert!(result.vms[0].nics.is_empty());
    }

    #[tokio::test]
    async fn test_authentication_error_recorded() {
        let mock = MockSite {
            connect_failure: Some(Failure::Auth),
            ..Default::default()
        };
        let connector = MockConnector::default().with_site("denver.vergeos.local", mock);

        let result = fetch_site(&connector, &site("denver")).await;

        assert!(result.vms.is_empty());
        assert!(result.error.unwrap().starts_with("Authentication failed"));
    }

    #[tokio::test]
    async fn test_connection_error_recorded() {
        let mock = MockSite {
            connect_failure: Some(Failure::Connect),
            ..Default::default()
        };
        let connector = MockConnector::default().with_site("denver.vergeos.local", mock);

        let result = fetch_site(&connector, &site("denver")).await;

        assert!(result.vms.is_empty());
        assert!(result.error.unwrap().starts_with("Connection failed"));
    }

    #[tokio::test]
    async fn test_scheme_stripped_and_token_preferred() {
        let connector =
            MockConnector::default().with_site("denver.vergeos.local", simple_site("web01"));
        let mut config = site("denver");
        config.host = "https://denver.vergeos.local".to_string();
        config.api_key = Some("token-abc".to_string());

        let result = fetch_site(&connector, &config).await;

        assert!(result.is_ok());
        assert_eq!(result.site_url, "https://denver.vergeos.local");
        let seen = connector.seen.lock().unwrap();
        assert_eq!(seen[0].host, "denver.vergeos.local");
        assert_eq!(seen[0].credential, Credential::Token("token-abc".into()));
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_result_per_site() {
        let connector = MockConnector::default()
            .with_site("denver.vergeos.local", simple_site("web01"))
            .with_site("chicago.vergeos.local", simple_site("db01"));
        let sites = vec![site("denver"), site("chicago"), site("boston")];

        let results = fetcher(connector, 10, Duration::from_secs(5))
            .fetch_all(&sites)
            .await;

        assert_eq!(results.len(), 3);
        let boston = results.iter().find(|r| r.site == "boston").unwrap();
        assert!(boston.error.is_some());
        assert!(boston.vms.is_empty());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[tokio::test]
    async fn test_blocked_site_times_out_without_delaying_others() {
        let mut connector = MockConnector::default();
        let names = ["s1", "s2", "s3", "s4", "s5"];
        for name in names {
            let mut mock = simple_site(&format!("{name}-vm"));
            mock.hang = name == "s3";
            connector = connector.with_site(&format!("{name}.vergeos.local"), mock);
        }
        let sites: Vec<SiteConfig> = names.iter().map(|n| site(n)).collect();

        let start = Instant::now();
        let results = fetcher(connector, 10, Duration::from_secs(1))
            .fetch_all(&sites)
            .await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);

        let blocked = results.iter().find(|r| r.site == "s3").unwrap();
        assert!(blocked.vms.is_empty());
        assert_eq!(blocked.error.as_deref(), Some("Timeout after 1s"));
    }

    #[tokio::test]
    async fn test_sub_second_timeout_reported_precisely() {
        let mut mock = simple_site("web01");
        mock.hang = true;
        let connector = MockConnector::default().with_site("denver.vergeos.local", mock);

        let results = fetcher(connector, 1, Duration::from_millis(200))
            .fetch_all(&[site("denver")])
            .await;

        assert_eq!(results[0].error.as_deref(), Some("Timeout after 200ms"));
    }

    #[tokio::test]
    async fn test_worker_bound_respected() {
        let mut connector = MockConnector {
            delay: Duration::from_millis(50),
            ..Default::default()
        };
        let mut sites = Vec::new();
        for i in 0..6 {
            let name = format!("site{i}");
            connector = connector.with_site(&format!("{name}.vergeos.local"), simple_site("vm"));
            sites.push(site(&name));
        }
        let peak = Arc::clone(&connector.peak);

        let results = fetcher(connector, 2, Duration::from_secs(5))
            .fetch_all(&sites)
            .await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_empty_site_list() {
        let results = fetcher(MockConnector::default(), 4, Duration::from_secs(1))
            .fetch_all(&[])
            .await;
        assert!(results.is_empty());
    }
}
