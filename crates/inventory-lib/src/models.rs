//! Core data models for the VergeOS inventory

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Default per-request timeout for a site, in seconds
pub const DEFAULT_SITE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One configured VergeOS site
#[derive(Clone, PartialEq, Deserialize)]
pub struct SiteConfig {
    /// Unique site identifier, used in group names and hostname templates
    #[serde(default)]
    pub name: String,
    /// Hostname or IP of the VergeOS system, optionally with a scheme
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout: u64,
}

fn default_request_timeout() -> u64 {
    DEFAULT_SITE_REQUEST_TIMEOUT_SECS
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SiteConfig {
    /// Create a site authenticated with username and password
    pub fn with_password(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            api_key: None,
            insecure: false,
            timeout: DEFAULT_SITE_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Create a site authenticated with an API key
    pub fn with_api_key(
        name: impl Into<String>,
        host: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            username: None,
            password: None,
            api_key: Some(api_key.into()),
            insecure: false,
            timeout: DEFAULT_SITE_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Host with any leading `https://` or `http://` scheme removed
    pub fn bare_host(&self) -> &str {
        self.host
            .strip_prefix("https://")
            .or_else(|| self.host.strip_prefix("http://"))
            .unwrap_or(&self.host)
    }

    /// Credential to present to the site. An API key wins over username/password.
    pub fn credential(&self) -> Option<Credential> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(Credential::Token(key.to_string()));
        }
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Credential::Basic {
                    username: user.to_string(),
                    password: pass.to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Credential used to authenticate against a site
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Token(String),
    Basic { username: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Token(***)"),
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Conversion from one element of an API listing.
///
/// Listings are decoded element by element so one odd record never costs
/// the rest of the listing.
pub trait FromRecord: Sized {
    fn from_record(record: Value) -> Result<Self, RecordError>;
}

fn into_object(record: Value) -> Result<Map<String, Value>, RecordError> {
    match record {
        Value::Object(fields) => Ok(fields),
        _ => Err(RecordError::NotAnObject),
    }
}

/// VM record as returned by the VergeOS API.
///
/// The source object is kept as-is, explicit nulls included, and re-emitted
/// as `vm_data`. Known fields are read through accessors that treat a value
/// of an unexpected type as absent. `_tags` and `_nics` are synthesized by
/// the site fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVm {
    /// Resolved tag display names
    #[serde(rename = "_tags", default)]
    pub tags: Vec<String>,
    /// NIC records attached to this VM's machine
    #[serde(rename = "_nics", default)]
    pub nics: Vec<Nic>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl FromRecord for RawVm {
    /// Accepts any object with an integer `$key`
    fn from_record(record: Value) -> Result<Self, RecordError> {
        let mut fields = into_object(record)?;
        if fields.get("$key").and_then(Value::as_u64).is_none() {
            return Err(RecordError::InvalidField("$key"));
        }
        fields.remove("_tags");
        fields.remove("_nics");
        Ok(Self {
            tags: Vec::new(),
            nics: Vec::new(),
            fields,
        })
    }
}

impl RawVm {
    pub fn new(key: u64, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self::default().with_field("$key", key).with_field("name", name)
    }

    pub fn with_status(self, status: impl Into<String>) -> Self {
        let status: String = status.into();
        self.with_field("status", status)
    }

    pub fn with_machine(self, machine: u64) -> Self {
        self.with_field("machine", machine)
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(field, value);
        self
    }

    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Look up a field by its API name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn key(&self) -> Option<u64> {
        self.field("$key").and_then(Value::as_u64)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    pub fn power_state(&self) -> Option<&str> {
        self.str_field("power_state")
    }

    pub fn os_family(&self) -> Option<&str> {
        self.str_field("os_family")
    }

    /// Machine id, the join key for NICs
    pub fn machine(&self) -> Option<u64> {
        self.field("machine").and_then(Value::as_u64)
    }

    pub fn is_snapshot(&self) -> bool {
        self.field("is_snapshot")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Status, falling back to `power_state` when `status` is absent
    pub fn effective_status(&self) -> Option<&str> {
        self.status().or_else(|| self.power_state())
    }

    /// The record as the API returned it, without `_`-prefixed pipeline fields
    pub fn raw_fields(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Tag definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "$key")]
    pub id: u64,
    pub name: String,
}

impl FromRecord for Tag {
    fn from_record(record: Value) -> Result<Self, RecordError> {
        let fields = into_object(record)?;
        let id = fields
            .get("$key")
            .and_then(Value::as_u64)
            .ok_or(RecordError::InvalidField("$key"))?;
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or(RecordError::InvalidField("name"))?;
        Ok(Self {
            id,
            name: name.to_string(),
        })
    }
}

/// Tag assignment row; `member` has the form `<resource_type>/<numeric_id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMembership {
    pub tag: u64,
    #[serde(default)]
    pub member: String,
}

/// Parsed tag member reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagMember {
    Vm(u64),
    Other { resource_type: String, id: u64 },
}

impl FromRecord for TagMembership {
    fn from_record(record: Value) -> Result<Self, RecordError> {
        let fields = into_object(record)?;
        let tag = fields
            .get("tag")
            .and_then(Value::as_u64)
            .ok_or(RecordError::InvalidField("tag"))?;
        let member = match fields.get("member") {
            Some(Value::String(member)) => member.clone(),
            Some(Value::Null) | None => String::new(),
            Some(_) => return Err(RecordError::InvalidField("member")),
        };
        Ok(Self { tag, member })
    }
}

impl TagMembership {
    pub fn new(tag: u64, member: impl Into<String>) -> Self {
        Self {
            tag,
            member: member.into(),
        }
    }

    /// Parse the member reference, `None` if it is malformed
    pub fn parse_member(&self) -> Option<TagMember> {
        let (resource_type, id) = self.member.split_once('/')?;
        let id = id.parse::<u64>().ok()?;
        match resource_type {
            "vms" => Some(TagMember::Vm(id)),
            other => Some(TagMember::Other {
                resource_type: other.to_string(),
                id,
            }),
        }
    }
}

/// NIC record, kept as the API returned it.
///
/// `machine` is the foreign key to the owning VM's machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nic {
    fields: Map<String, Value>,
}

impl FromRecord for Nic {
    fn from_record(record: Value) -> Result<Self, RecordError> {
        Ok(Self {
            fields: into_object(record)?,
        })
    }
}

impl Nic {
    pub fn new(machine: u64) -> Self {
        Self::default().with_field("machine", machine)
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn machine(&self) -> Option<u64> {
        self.field("machine").and_then(Value::as_u64)
    }

    /// First non-blank address under either known field name
    pub fn ip_address(&self) -> Option<&str> {
        ["ipaddress", "ip_address"]
            .iter()
            .filter_map(|field| self.field(field).and_then(Value::as_str))
            .find(|ip| !ip.trim().is_empty())
    }
}

/// Outcome of fetching one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteResult {
    pub site: String,
    pub site_url: String,
    pub vms: Vec<RawVm>,
    pub error: Option<String>,
}

impl SiteResult {
    pub fn success(site: &SiteConfig, vms: Vec<RawVm>) -> Self {
        Self {
            site: site.name.clone(),
            site_url: site.host.clone(),
            vms,
            error: None,
        }
    }

    pub fn failure(site: &SiteConfig, error: impl Into<String>) -> Self {
        Self {
            site: site.name.clone(),
            site_url: site.host.clone(),
            vms: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
