//! Multi-site VergeOS VM inventory library
//!
//! This crate provides the core functionality for:
//! - Concurrent VM/tag/NIC fetching across VergeOS sites
//! - VM filtering and hostname resolution
//! - Group assignment and host variable projection
//! - Inventory caching and restore
//! - Configuration, metrics and structured logging

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod grouping;
pub mod hooks;
pub mod hostvars;
pub mod inventory;
pub mod models;
pub mod observability;

pub use builder::{BuildOutcome, BuildSource, InventoryBuilder, PopulateStats};
pub use config::InventoryConfig;
pub use error::{ClientError, ConfigError, HookError, InventoryError, RecordError};
pub use inventory::{CacheRecord, CacheStore, HostVars, InventoryGraph};
pub use models::*;
pub use observability::{InventoryLogger, InventoryMetrics};
