use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache connection timed out after {elapsed_ms}ms")]
    ConnectionTimeout { elapsed_ms: u64 },
    #[error("Cache client is not connected")]
    NotConnected,
    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid cache config: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Returns true if the error means the connection handle can no longer be trusted.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::NotConnected)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised while building cache keys.
///
/// Unlike [`CacheError`], these are programming errors at the call site and
/// are always surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Must have all id columns, missing: {}", missing.join(", "))]
    MissingIdColumns { missing: Vec<String> },
    #[error("Cache key arguments must be a JSON object, got: {0}")]
    NotARecord(String),
}
