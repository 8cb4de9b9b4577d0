//! Application configuration, loaded from a TOML file with env-var and
//! CLI overrides layered on top by the binary crate.

use serde::{Deserialize, Serialize};

/// Top level configuration for the boomerang service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub dispatcher: DispatcherConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            dispatcher: DispatcherConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port the `/submit` HTTP ingress listens on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
        }
    }
}

/// One `(queueCapacity, batchSize, maxWait)` triple, per `BulkProcessor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkWriterConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub max_wait_ms: u64,
}

impl Default for BulkWriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::bulk_queue_capacity(),
            batch_size: defaults::bulk_batch_size(),
            max_wait_ms: defaults::bulk_max_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub save: BulkWriterConfig,
    pub update: BulkWriterConfig,
    pub delete: BulkWriterConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save: BulkWriterConfig::default(),
            update: BulkWriterConfig::default(),
            delete: BulkWriterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub load_batch_size: usize,
    pub max_concurrency: usize,
    pub idle_sleep_ms: u64,
    pub http_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            load_batch_size: defaults::load_batch_size(),
            max_concurrency: defaults::max_concurrency(),
            idle_sleep_ms: defaults::idle_sleep_ms(),
            http_timeout_ms: defaults::http_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::metrics_enabled(),
            endpoint: defaults::metrics_endpoint(),
        }
    }
}

mod defaults {
    pub const fn port() -> u16 {
        8888
    }

    pub const fn bulk_queue_capacity() -> usize {
        1000
    }
    pub const fn bulk_batch_size() -> usize {
        100
    }
    pub const fn bulk_max_wait_ms() -> u64 {
        10
    }

    pub const fn load_batch_size() -> usize {
        100
    }
    pub const fn max_concurrency() -> usize {
        100
    }
    pub const fn idle_sleep_ms() -> u64 {
        1000
    }
    pub const fn http_timeout_ms() -> u64 {
        5000
    }

    pub const fn metrics_enabled() -> bool {
        false
    }
    pub fn metrics_endpoint() -> String {
        "http://localhost:4318/v1/metrics".to_string()
    }
}
