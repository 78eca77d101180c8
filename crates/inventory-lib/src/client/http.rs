//! HTTP transport for the VergeOS v4 REST API

use super::{async_trait, ConnectParams, SiteClient, SiteConnector};
use crate::error::ClientError;
use crate::models::{Credential, FromRecord, Nic, RawVm, Tag, TagMembership};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const API_PREFIX: &str = "api/v4";

/// VergeOS API client for one site
pub struct VergeOsClient {
    site: String,
    client: Client,
    base_url: Url,
    credential: Credential,
    timeout: Duration,
}

impl VergeOsClient {
    /// Create a client for `https://<host>/`
    pub fn connect(params: ConnectParams) -> Result<Self, ClientError> {
        let base_url = format!("https://{}/", params.host);
        let client =
            Self::with_base_url(&base_url, params.credential, params.insecure, params.timeout)?;
        Ok(client.with_site_name(params.site))
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(
        base_url: &str,
        credential: Credential,
        insecure: bool,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| ClientError::Connection(format!("failed to create HTTP client: {e}")))?;

        let mut base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Connection(format!("invalid site URL {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            site: base_url.host_str().unwrap_or_default().to_string(),
            client,
            base_url,
            credential,
            timeout,
        })
    }

    /// Label log events with `name` instead of the URL host
    pub fn with_site_name(mut self, name: impl Into<String>) -> Self {
        self.site = name.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Credential::Token(token) => request.bearer_auth(token),
            Credential::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Connection(err.to_string())
        }
    }

    /// GET a collection resource with all fields
    async fn list<T: FromRecord>(&self, resource: &str) -> Result<Vec<T>, ClientError> {
        let url = self
            .base_url
            .join(&format!("{API_PREFIX}/{resource}"))
            .map_err(|e| ClientError::Connection(format!("invalid resource path {resource}: {e}")))?;

        debug!(url = %url, "Listing VergeOS resource");

        let response = self
            .authorize(self.client.get(url).query(&[("fields", "all")]))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(ClientError::Authentication(message));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let records: Option<Vec<Value>> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::Decode(e.to_string())
            }
        })?;

        Ok(decode_records(&self.site, resource, records.unwrap_or_default()))
    }
}

/// Convert listing elements one at a time, skipping any that do not fit
fn decode_records<T: FromRecord>(site: &str, resource: &str, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| {
            let key = record.get("$key").cloned().unwrap_or(Value::Null);
            match T::from_record(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(
                        event = "record_skipped",
                        site = %site,
                        resource = %resource,
                        key = %key,
                        error = %e,
                        "Skipping malformed API record"
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl SiteClient for VergeOsClient {
    async fn list_vms(&self) -> Result<Vec<RawVm>, ClientError> {
        self.list("vms").await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ClientError> {
        self.list("tags").await
    }

    async fn list_tag_memberships(&self) -> Result<Vec<TagMembership>, ClientError> {
        self.list("tag_members").await
    }

    async fn list_nics(&self) -> Result<Vec<Nic>, ClientError> {
        self.list("machine_nics").await
    }
}

/// Connector producing [`VergeOsClient`]s over HTTPS
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

#[async_trait]
impl SiteConnector for HttpConnector {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn SiteClient>, ClientError> {
        Ok(Arc::new(VergeOsClient::connect(params)?))
    }
}
