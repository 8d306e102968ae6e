//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use recall_core::cache::{CacheError, Connector, Result, StoreConnection};

use crate::store::MemoryStore;

/// A [`MemoryStore`] with injectable latency, failures and connect refusals.
///
/// Every clone shares counters and switches, so a test keeps one handle
/// while the client owns another.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub memory: MemoryStore,
    /// Store primitives invoked (including failed ones).
    pub calls: Arc<AtomicUsize>,
    /// Connect attempts made.
    pub connects: Arc<AtomicUsize>,
    latency_ms: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
    refusals_left: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Makes every primitive fail with a connection error.
    pub fn fail_operations(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Refuses the next `count` connect attempts.
    pub fn refuse_connections(&self, count: usize) {
        self.refusals_left.store(count, Ordering::SeqCst);
    }

    async fn before_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionFailed("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for FaultyStore {
    type Connection = FaultyStore;

    async fn connect(&self) -> Result<FaultyStore> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(CacheError::ConnectionFailed("connection refused".to_string()));
        }
        Ok(self.clone())
    }
}

#[async_trait]
impl StoreConnection for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.before_call().await?;
        self.memory.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.before_call().await?;
        self.memory.set_with_ttl(key, value, ttl).await
    }

    async fn add_to_set(&self, key: &str, member: &str, set_ttl: Duration) -> Result<()> {
        self.before_call().await?;
        self.memory.add_to_set(key, member, set_ttl).await
    }

    async fn create_set(&self, key: &str, members: &[String]) -> Result<u64> {
        self.before_call().await?;
        self.memory.create_set(key, members).await
    }

    async fn pop_from_set(&self, key: &str) -> Result<Option<String>> {
        self.before_call().await?;
        self.memory.pop_from_set(key).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.before_call().await?;
        self.memory.set_members(key).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.before_call().await?;
        self.memory.delete(keys).await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        self.before_call().await?;
        self.memory.scan(cursor, pattern, count).await
    }

    async fn flush_all(&self) -> Result<()> {
        self.before_call().await?;
        self.memory.flush_all().await
    }
}
