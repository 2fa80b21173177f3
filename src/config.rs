// Copyright (c) 2025 - Cowboy AI, Inc.
//! Engine configuration
//!
//! Defaults match the physical conventions of the facility (42U racks, 18U
//! minimum rack size, 1-4U hosts). Values can be overridden from the
//! environment or a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{InventoryError, InventoryResult};

/// Physical and size limits enforced by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Fixed minimum rack size in units
    pub min_rack_height: u32,
    /// Height of a rack created without one
    pub default_rack_height: u32,
    /// Height of a datacenter created without one
    pub default_datacenter_height: u32,
    pub min_host_height: u32,
    pub max_host_height: u32,
    pub max_name_length: usize,
    /// Largest address range accepted in one pool operation
    pub max_pool_range: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_rack_height: 18,
            default_rack_height: 42,
            default_datacenter_height: 42,
            min_host_height: 1,
            max_host_height: 4,
            max_name_length: 64,
            max_pool_range: 4096,
        }
    }
}

/// Configuration for the inventory engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: Limits,
    /// Deadline for acquiring all locks of one transaction
    pub lock_timeout_ms: u64,
    /// JSON-lines journal; in-memory when unset
    pub journal_path: Option<PathBuf>,
    /// fsync the journal after every commit
    pub sync_journal: bool,
    /// Idle lock entries are pruned once the table grows past this size
    pub lock_table_prune_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            lock_timeout_ms: 5_000,
            journal_path: None,
            sync_journal: false,
            lock_table_prune_threshold: 1_024,
        }
    }
}

fn env_var<T: FromStr>(key: &str) -> InventoryResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| InventoryError::Configuration(format!("{} has invalid value '{}'", key, raw))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(InventoryError::Configuration(format!("{}: {}", key, err))),
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Load configuration from `INVENTORY_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> InventoryResult<Self> {
        let mut config = Self::default();

        if let Some(path) = env_var::<PathBuf>("INVENTORY_JOURNAL")? {
            config.journal_path = Some(path);
        }
        if let Some(sync) = env_var::<bool>("INVENTORY_SYNC_JOURNAL")? {
            config.sync_journal = sync;
        }
        if let Some(timeout) = env_var::<u64>("INVENTORY_LOCK_TIMEOUT_MS")? {
            config.lock_timeout_ms = timeout;
        }
        if let Some(height) = env_var::<u32>("INVENTORY_MIN_RACK_HEIGHT")? {
            config.limits.min_rack_height = height;
        }
        if let Some(height) = env_var::<u32>("INVENTORY_DEFAULT_RACK_HEIGHT")? {
            config.limits.default_rack_height = height;
        }
        if let Some(height) = env_var::<u32>("INVENTORY_DEFAULT_DATACENTER_HEIGHT")? {
            config.limits.default_datacenter_height = height;
        }
        if let Some(max) = env_var::<u64>("INVENTORY_MAX_POOL_RANGE")? {
            config.limits.max_pool_range = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InventoryError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| InventoryError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that cannot hold together
    pub fn validate(&self) -> InventoryResult<()> {
        let limits = &self.limits;
        if limits.min_rack_height == 0 {
            return Err(InventoryError::Configuration(
                "min_rack_height must be positive".into(),
            ));
        }
        if limits.default_rack_height < limits.min_rack_height {
            return Err(InventoryError::Configuration(format!(
                "default_rack_height {} is below min_rack_height {}",
                limits.default_rack_height, limits.min_rack_height
            )));
        }
        if limits.default_datacenter_height == 0 {
            return Err(InventoryError::Configuration(
                "default_datacenter_height must be positive".into(),
            ));
        }
        if limits.min_host_height == 0 || limits.min_host_height > limits.max_host_height {
            return Err(InventoryError::Configuration(format!(
                "host height bounds {}..={} are empty",
                limits.min_host_height, limits.max_host_height
            )));
        }
        if limits.max_name_length == 0 || limits.max_pool_range == 0 {
            return Err(InventoryError::Configuration(
                "max_name_length and max_pool_range must be positive".into(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(InventoryError::Configuration(
                "lock_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
