//! Configuration for the inventory core.
//!
//! Loaded in layers:
//! 1. Default values in code
//! 2. Optional `stockledger.toml` (or the file named by `STOCKLEDGER_CONFIG`)
//! 3. Environment variable overrides with the `STOCKLEDGER__` prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Inventory core configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Longest wait for a product critical section, in milliseconds.
    /// Zero means try once and fail immediately.
    pub lock_timeout_ms: u64,

    /// Per-call timeout for product catalog lookups, in milliseconds.
    pub catalog_timeout_ms: u64,

    /// Skip lots already expired on the sale date when allocating.
    pub skip_expired_lots: bool,

    /// Reject movements naming products the catalog does not know.
    pub require_known_products: bool,
}

impl InventoryConfig {
    /// Load configuration from the optional file and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("STOCKLEDGER_CONFIG").unwrap_or_else(|_| "stockledger".into());
        Self::builder()?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix("STOCKLEDGER").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Load with only the in-code defaults plus `overrides` (`key`, `value`).
    pub fn from_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::builder()?;
        for (key, value) in overrides {
            builder = builder.set_override(key, value)?;
        }
        builder.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("lock_timeout_ms", defaults.lock_timeout_ms)?
            .set_default("catalog_timeout_ms", defaults.catalog_timeout_ms)?
            .set_default("skip_expired_lots", defaults.skip_expired_lots)?
            .set_default("require_known_products", defaults.require_known_products)
    }

    pub fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::from(self)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
            catalog_timeout_ms: 1000,
            skip_expired_lots: false,
            require_known_products: true,
        }
    }
}

/// Runtime form of [`InventoryConfig`] used by the movement coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub lock_timeout: Duration,
    pub catalog_timeout: Duration,
    pub skip_expired_lots: bool,
    pub require_known_products: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        InventoryConfig::default().settings()
    }
}

impl From<&InventoryConfig> for CoordinatorSettings {
    fn from(cfg: &InventoryConfig) -> Self {
        Self {
            lock_timeout: Duration::from_millis(cfg.lock_timeout_ms),
            catalog_timeout: Duration::from_millis(cfg.catalog_timeout_ms),
            skip_expired_lots: cfg.skip_expired_lots,
            require_known_products: cfg.require_known_products,
        }
    }
}
