//! Error types for the inventory pipeline

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a site client.
///
/// The `Display` text becomes the `error` string of a failed site result.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Why one element of an API listing could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("field '{0}' is missing or has an unexpected type")]
    InvalidField(&'static str),
}

/// Configuration errors, fatal before any site is contacted
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load inventory config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unsupported inventory source {0}: expected a .vergeos_vms.yml or .vergeos_vms.yaml file")]
    UnsupportedSource(String),

    #[error("Unknown plugin '{0}': expected 'vergeos_vms' or 'vergeio.vergeos.vergeos_vms'")]
    WrongPlugin(String),

    #[error("At least one site must be configured in 'sites'")]
    NoSites,

    #[error("Site at index {0} is missing required 'name' field")]
    MissingSiteName(usize),

    #[error("Site '{0}' is missing required 'host' field")]
    MissingHost(String),

    #[error("Site '{0}' must have either 'api_key' or 'username' and 'password' for authentication")]
    MissingCredentials(String),

    #[error("Site name '{0}' is configured more than once")]
    DuplicateSite(String),

    #[error("Invalid name_pattern filter '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("max_workers must be at least 1")]
    NoWorkers,
}

/// Failure of a post-processing hook for one host
#[derive(Debug, Error)]
pub enum HookError {
    #[error("variable '{0}' is not defined")]
    MissingVariable(String),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the inventory builder and graph
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error processing host {host}: {source}")]
    Hook {
        host: String,
        #[source]
        source: HookError,
    },

    #[error("Host '{0}' is not in the inventory")]
    UnknownHost(String),

    #[error("Group '{0}' is not in the inventory")]
    UnknownGroup(String),

    #[error("Inventory cache error: {0}")]
    Cache(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_categories() {
        assert!(ClientError::Authentication("bad password".into())
            .to_string()
            .starts_with("Authentication failed"));
        assert!(ClientError::Connection("refused".into())
            .to_string()
            .starts_with("Connection failed"));
        assert_eq!(
            ClientError::Timeout(Duration::from_secs(60)).to_string(),
            "Timeout after 60s"
        );
        assert_eq!(
            ClientError::Timeout(Duration::from_millis(250)).to_string(),
            "Timeout after 250ms"
        );
        assert_eq!(
            ClientError::Api {
                status: 500,
                message: "boom".into()
            }
            .to_string(),
            "API error (500): boom"
        );
    }

    #[test]
    fn test_hook_error_names_host() {
        let err = InventoryError::Hook {
            host: "denver_web01".into(),
            source: HookError::MissingVariable("vergeos_owner".into()),
        };
        assert_eq!(
            err.to_string(),
            "Error processing host denver_web01: variable 'vergeos_owner' is not defined"
        );
    }
}
