use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Raw primitives of the backing key-value store.
///
/// Implementations talk to the store directly and do not apply deadlines;
/// the client wrapping them races every call against its own timeout.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Gets a string value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets a string value that expires after `ttl`, atomically.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Adds `member` to the set at `key` and (re)sets the set's expiry to `set_ttl`.
    async fn add_to_set(&self, key: &str, member: &str, set_ttl: Duration) -> Result<()>;

    /// Adds `members` to the set at `key`, returning how many were new.
    async fn create_set(&self, key: &str, members: &[String]) -> Result<u64>;

    /// Removes and returns a random member of the set at `key`.
    async fn pop_from_set(&self, key: &str) -> Result<Option<String>>;

    /// Returns every member of the set at `key`; empty if the set is absent.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Deletes `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Runs one `SCAN` round. A returned cursor of 0 means the scan is complete.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;

    /// Deletes everything in the store.
    async fn flush_all(&self) -> Result<()>;
}

/// Opens connections to the store.
///
/// The client calls this at startup and again whenever it observes that
/// its connection is gone.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: StoreConnection + 'static;

    async fn connect(&self) -> Result<Self::Connection>;
}
