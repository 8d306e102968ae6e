use std::env;

use recall_core::cache::{
    KeyBuilder, Result, ScanOptions, StoreOptions, DEFAULT_CONN_DELAY_MS,
    DEFAULT_CONN_TIMEOUT_MS, DEFAULT_DELETE_BATCH, DEFAULT_NAMESPACE, DEFAULT_OP_TIMEOUT_MS,
    DEFAULT_SCAN_COUNT,
};

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Cache configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Redis connection URL (default: "redis://localhost:6379")
    pub redis_url: String,
    /// Key namespace (default: "cache")
    pub namespace: String,
    /// Startup poll delay unit in milliseconds (default: 200)
    pub conn_delay_ms: u64,
    /// Startup deadline in milliseconds (default: 3,000)
    pub conn_timeout_ms: u64,
    /// Per-operation timeout in milliseconds (default: 100)
    pub op_timeout_ms: u64,
    /// `SCAN COUNT` hint (default: 1,000)
    pub scan_count: usize,
    /// Pending matches before a batch delete (default: 100)
    pub delete_batch: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `CACHE_NAMESPACE` - Key namespace (default: "cache")
    /// - `CONN_DELAY_MS` - Startup poll delay unit (default: 200)
    /// - `CONN_TIMEOUT_MS` - Startup deadline (default: 3,000)
    /// - `CACHE_OP_TIMEOUT_MS` - Per-operation timeout (default: 100)
    /// - `CACHE_SCAN_COUNT` - `SCAN COUNT` hint (default: 1,000)
    /// - `CACHE_DELETE_BATCH` - Pending matches before a batch delete (default: 100)
    ///
    /// Values that fail to parse fall back to their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |name: &str, default: u64| {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            namespace: lookup("CACHE_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            conn_delay_ms: parsed("CONN_DELAY_MS", DEFAULT_CONN_DELAY_MS),
            conn_timeout_ms: parsed("CONN_TIMEOUT_MS", DEFAULT_CONN_TIMEOUT_MS),
            op_timeout_ms: parsed("CACHE_OP_TIMEOUT_MS", DEFAULT_OP_TIMEOUT_MS),
            scan_count: lookup("CACHE_SCAN_COUNT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_SCAN_COUNT),
            delete_batch: lookup("CACHE_DELETE_BATCH")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_DELETE_BATCH),
        }
    }

    /// Validated connection and operation timeouts.
    pub fn store_options(&self) -> Result<StoreOptions> {
        StoreOptions::new(self.conn_delay_ms, self.conn_timeout_ms, self.op_timeout_ms)
    }

    /// Validated scan and batch sizes.
    pub fn scan_options(&self) -> Result<ScanOptions> {
        ScanOptions::new(self.scan_count, self.delete_batch)
    }

    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(self.namespace.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
