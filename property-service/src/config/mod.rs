use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::time::Duration;

use crate::ledger::LedgerOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mongodb: MongoConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_uri")]
    pub uri: String,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    #[serde(default = "default_mongo_collection")]
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_true")]
    pub serialize_writes: bool,
    /// Per store call; `0` disables the deadline.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongo_uri(),
            database: default_mongo_database(),
            collection: default_mongo_collection(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            serialize_writes: true,
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: default_service_name(),
            log_level: default_log_level(),
            otlp_endpoint: None,
            store: StoreConfig::default(),
            mongodb: MongoConfig::default(),
            ledger: LedgerConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl PropertyConfig {
    /// Load from `configuration.*` and `APP__*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        let config: Self = core_config::load()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.pagination.max_limit == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "pagination.max_limit must be greater than zero"
            )));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "pagination.default_limit ({}) exceeds pagination.max_limit ({})",
                self.pagination.default_limit,
                self.pagination.max_limit
            )));
        }
        if self.store.backend == StoreBackend::Mongodb && self.mongodb.uri.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "mongodb.uri is required for the mongodb store backend"
            )));
        }
        Ok(())
    }
}

impl LedgerConfig {
    pub fn options(&self) -> LedgerOptions {
        LedgerOptions {
            serialize_writes: self.serialize_writes,
            store_timeout: (self.store_timeout_ms > 0)
                .then(|| Duration::from_millis(self.store_timeout_ms)),
        }
    }
}

fn default_service_name() -> String {
    "property-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "property_db".to_string()
}

fn default_mongo_collection() -> String {
    "events".to_string()
}

fn default_true() -> bool {
    true
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_limit() -> u64 {
    50
}

fn default_max_limit() -> u64 {
    500
}
