//! Redis connection implementing the raw store primitives.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use recall_core::cache::{Connector, Result, StoreConnection};

use super::error::map_redis_error;

/// Converts a TTL to whole seconds for `EX`/`EXPIRE`, rounding up.
///
/// Redis rejects a zero expiry, so the minimum is one second.
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl
        .as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.max(1)
}

/// Opens [`RedisConnection`]s for a Redis URL.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: redis::Client,
}

impl RedisConnector {
    /// Creates a connector for `url` (e.g. "redis://localhost:6379").
    ///
    /// # Errors
    ///
    /// Returns `CacheError::OperationFailed` if the URL cannot be parsed.
    /// No connection is attempted until [`Connector::connect`].
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self) -> Result<RedisConnection> {
        let conn = ConnectionManager::new(self.client.clone())
            .await
            .map_err(map_redis_error)?;
        Ok(RedisConnection { conn })
    }
}

/// A live Redis connection.
pub struct RedisConnection {
    conn: ConnectionManager,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, expiry_secs(ttl))
            .await
            .map_err(map_redis_error)
    }

    async fn add_to_set(&self, key: &str, member: &str, set_ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let secs = i64::try_from(expiry_secs(set_ttl)).unwrap_or(i64::MAX);

        // SADD and EXPIRE in one MULTI so a set never exists without a TTL.
        let () = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .expire(key, secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn create_set(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut conn = self.conn.clone();
        let added: u64 = conn.sadd(key, members).await.map_err(map_redis_error)?;
        Ok(added)
    }

    async fn pop_from_set(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let member: Option<String> = conn.spop(key).await.map_err(map_redis_error)?;
        Ok(member)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await.map_err(map_redis_error)?;
        Ok(members)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await.map_err(map_redis_error)?;
        Ok(removed)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok((next_cursor, keys))
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}
