//! Redis error mapping to CacheError.

use recall_core::cache::CacheError;

/// Maps Redis errors to CacheError.
///
/// Anything that means the socket is unusable becomes `ConnectionFailed`, which
/// makes the client drop its handle and reconnect on next access.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || err.is_timeout()
    {
        CacheError::ConnectionFailed(err.to_string())
    } else {
        CacheError::OperationFailed(err.to_string())
    }
}
