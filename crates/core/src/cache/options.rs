//! Validated option types for the store client.

use std::time::Duration;

use super::error::{CacheError, Result};

/// Default startup poll delay in milliseconds.
pub const DEFAULT_CONN_DELAY_MS: u64 = 200;
/// Default startup deadline in milliseconds.
pub const DEFAULT_CONN_TIMEOUT_MS: u64 = 3_000;
/// Default deadline for a single store primitive in milliseconds.
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 100;
/// Default `SCAN COUNT` hint.
pub const DEFAULT_SCAN_COUNT: usize = 1_000;
/// Default number of accumulated matches that triggers a batch delete.
pub const DEFAULT_DELETE_BATCH: usize = 100;

/// Timing options for connecting to and talking with the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Unit of the startup backoff; also the slow-start warning threshold.
    pub conn_delay_ms: u64,
    /// Startup fails once this much time has elapsed without a connection.
    pub conn_timeout_ms: u64,
    /// Deadline raced against every store primitive.
    pub op_timeout_ms: u64,
}

impl StoreOptions {
    /// Create and validate store options.
    pub fn new(conn_delay_ms: u64, conn_timeout_ms: u64, op_timeout_ms: u64) -> Result<Self> {
        if conn_delay_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "connection delay must be positive".to_string(),
            ));
        }
        if conn_timeout_ms < conn_delay_ms {
            return Err(CacheError::InvalidConfig(format!(
                "connection timeout ({conn_timeout_ms}ms) must not be shorter \
                 than the delay ({conn_delay_ms}ms)"
            )));
        }
        if op_timeout_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "operation timeout must be positive".to_string(),
            ));
        }

        Ok(Self {
            conn_delay_ms,
            conn_timeout_ms,
            op_timeout_ms,
        })
    }

    pub fn conn_delay(&self) -> Duration {
        Duration::from_millis(self.conn_delay_ms)
    }

    pub fn conn_timeout(&self) -> Duration {
        Duration::from_millis(self.conn_timeout_ms)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            conn_delay_ms: DEFAULT_CONN_DELAY_MS,
            conn_timeout_ms: DEFAULT_CONN_TIMEOUT_MS,
            op_timeout_ms: DEFAULT_OP_TIMEOUT_MS,
        }
    }
}

/// Batching options for pattern deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    pub scan_count: usize,
    pub delete_batch: usize,
}

impl ScanOptions {
    pub fn new(scan_count: usize, delete_batch: usize) -> Result<Self> {
        if scan_count == 0 {
            return Err(CacheError::InvalidConfig(
                "scan count must be at least 1".to_string(),
            ));
        }
        if delete_batch == 0 {
            return Err(CacheError::InvalidConfig(
                "delete batch must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            scan_count,
            delete_batch,
        })
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_count: DEFAULT_SCAN_COUNT,
            delete_batch: DEFAULT_DELETE_BATCH,
        }
    }
}
