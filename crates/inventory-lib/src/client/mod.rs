//! Site client adapter
//!
//! A site client wraps one VergeOS API endpoint and exposes the four bulk
//! listings the fetcher joins. Connectors build clients from site configs,
//! so the fetcher never depends on a concrete transport.

mod http;

pub use http::{HttpConnector, VergeOsClient};

use crate::error::ClientError;
use crate::models::{Credential, Nic, RawVm, SiteConfig, Tag, TagMembership};
use std::sync::Arc;
use std::time::Duration;

pub use async_trait::async_trait;

/// Connection parameters handed to a connector
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectParams {
    /// Site name, used to label log events
    pub site: String,
    /// Host without scheme, optionally with a port
    pub host: String,
    pub credential: Credential,
    pub insecure: bool,
    pub timeout: Duration,
}

impl ConnectParams {
    /// Derive connection parameters from a site config.
    ///
    /// Returns an authentication error when the site has no usable credential.
    pub fn from_site(site: &SiteConfig) -> Result<Self, ClientError> {
        let credential = site.credential().ok_or_else(|| {
            ClientError::Authentication(format!("no credentials configured for site '{}'", site.name))
        })?;

        Ok(Self {
            site: site.name.clone(),
            host: site.bare_host().to_string(),
            credential,
            insecure: site.insecure,
            timeout: site.request_timeout(),
        })
    }
}

/// Bulk listings exposed by one VergeOS site
#[async_trait]
pub trait SiteClient: Send + Sync {
    /// List every VM on the site
    async fn list_vms(&self) -> Result<Vec<RawVm>, ClientError>;

    /// List tag definitions
    async fn list_tags(&self) -> Result<Vec<Tag>, ClientError>;

    /// List every tag assignment
    async fn list_tag_memberships(&self) -> Result<Vec<TagMembership>, ClientError>;

    /// List every machine NIC
    async fn list_nics(&self) -> Result<Vec<Nic>, ClientError>;
}

/// Builds site clients
#[async_trait]
pub trait SiteConnector: Send + Sync {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn SiteClient>, ClientError>;
}
