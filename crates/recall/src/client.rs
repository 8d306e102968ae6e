//! Store client with a managed connection lifecycle.
//!
//! The client owns the single shared connection to the store:
//!
//! - `Uninitialized` until [`StoreClient::init`] is called, and again after
//!   [`StoreClient::shutdown`] or a failed startup
//! - `Connecting` while a connect attempt is in flight, or after the
//!   connection was observed lost
//! - `Ready` once a connection is held
//!
//! Every primitive except the bulk ones (`delete_matching`, `flush`) is raced
//! against the operation timeout. A hung store turns into `CacheError::Timeout`
//! for the one call instead of blocking the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use recall_core::cache::{
    encode_value, CacheError, Connector, Result, ScanOptions, StoreConnection, StoreOptions,
};

/// Lifecycle state of a [`StoreClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Ready,
}

struct Inner<C> {
    connection: Option<Arc<C>>,
    connecting: Option<JoinHandle<()>>,
    /// Set by `init`, cleared by `shutdown`. Lost connections are only
    /// re-established while the client is active.
    active: bool,
}

struct Shared<C> {
    inner: RwLock<Inner<C>>,
    state: watch::Sender<ConnectionState>,
}

impl<C> Shared<C> {
    fn publish(&self, inner: &Inner<C>) {
        let state = if inner.connection.is_some() {
            ConnectionState::Ready
        } else if inner.active {
            ConnectionState::Connecting
        } else {
            ConnectionState::Uninitialized
        };
        self.state.send_replace(state);
    }
}

/// Timeout-bounded access to a key-value store.
///
/// Cheap to share behind an `Arc`; concurrent calls multiplex over the one
/// connection without further locking.
pub struct StoreClient<K: Connector> {
    connector: Arc<K>,
    options: StoreOptions,
    scan: ScanOptions,
    shared: Arc<Shared<K::Connection>>,
}

impl<K: Connector> StoreClient<K> {
    /// Creates an uninitialized client. Nothing connects until [`init`](Self::init).
    pub fn new(connector: K, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            connector: Arc::new(connector),
            options,
            scan: ScanOptions::default(),
            shared: Arc::new(Shared {
                inner: RwLock::new(Inner {
                    connection: None,
                    connecting: None,
                    active: false,
                }),
                state,
            }),
        }
    }

    /// Sets the batching used by [`delete_matching`](Self::delete_matching).
    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    /// Creates a client and waits for it to become ready.
    pub async fn connect(connector: K, options: StoreOptions) -> Result<Self> {
        let client = Self::new(connector, options);
        client.init().await?;
        Ok(client)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Connects to the store, polling for readiness with a linear backoff.
    ///
    /// The i-th recheck happens `i * conn_delay` after the previous one. A
    /// failed connect attempt is retried at the next recheck. Startup taking
    /// longer than `conn_delay` is logged; longer than `conn_timeout` aborts.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionTimeout` if the store is not ready in time.
    /// The client is left `Uninitialized`.
    pub async fn init(&self) -> Result<()> {
        tracing::debug!(
            conn_delay_ms = self.options.conn_delay_ms,
            conn_timeout_ms = self.options.conn_timeout_ms,
            "Starting store connection"
        );

        {
            let mut inner = self.shared.inner.write().await;
            inner.active = true;
            self.shared.publish(&inner);
        }

        let started = Instant::now();
        let mut state_rx = self.shared.state.subscribe();
        let mut attempt: u32 = 0;

        loop {
            if *state_rx.borrow_and_update() == ConnectionState::Ready {
                tracing::debug!(
                    elapsed_ms = elapsed_ms(started),
                    "Store connection ready"
                );
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed > self.options.conn_delay() {
                tracing::warn!(
                    elapsed_ms = elapsed_ms(started),
                    "Store connection is taking too long"
                );
            }
            if elapsed > self.options.conn_timeout() {
                self.teardown().await;
                return Err(CacheError::ConnectionTimeout {
                    elapsed_ms: elapsed_ms(started),
                });
            }

            self.spawn_connect().await;

            attempt += 1;
            let backoff = self.options.conn_delay() * attempt;
            let _ = tokio::time::timeout(
                backoff,
                state_rx.wait_for(|state| *state == ConnectionState::Ready),
            )
            .await;
        }
    }

    /// Drops the connection and stops any reconnect in flight.
    pub async fn shutdown(&self) {
        self.teardown().await;
        tracing::debug!("Store client shut down");
    }

    async fn teardown(&self) {
        let mut inner = self.shared.inner.write().await;
        if let Some(task) = inner.connecting.take() {
            task.abort();
        }
        inner.connection = None;
        inner.active = false;
        self.shared.publish(&inner);
    }

    /// Starts a background connect attempt unless one is running or a
    /// connection is already held.
    async fn spawn_connect(&self) {
        let mut inner = self.shared.inner.write().await;
        if inner.connection.is_some() || !inner.active {
            return;
        }
        if inner
            .connecting
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }

        let connector = Arc::clone(&self.connector);
        let shared = Arc::clone(&self.shared);
        inner.connecting = Some(tokio::spawn(async move {
            match connector.connect().await {
                Ok(connection) => {
                    let mut inner = shared.inner.write().await;
                    if inner.active {
                        inner.connection = Some(Arc::new(connection));
                        shared.publish(&inner);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Store connection attempt failed");
                }
            }
        }));
        self.shared.publish(&inner);
    }

    /// Returns the current connection, or kicks off a reconnect and fails fast.
    async fn connection(&self) -> Result<Arc<K::Connection>> {
        {
            let inner = self.shared.inner.read().await;
            if let Some(connection) = &inner.connection {
                return Ok(Arc::clone(connection));
            }
        }

        self.spawn_connect().await;
        Err(CacheError::NotConnected)
    }

    /// Forgets `connection` after it failed with a connection-class error.
    async fn mark_lost(&self, connection: &Arc<K::Connection>, err: &CacheError) {
        let mut inner = self.shared.inner.write().await;
        let is_current = inner
            .connection
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, connection));
        if is_current {
            tracing::warn!(error = %err, "Store connection lost, reconnecting on next access");
            inner.connection = None;
            self.shared.publish(&inner);
        }
    }

    async fn observe<T>(&self, connection: &Arc<K::Connection>, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_connection_error() {
                self.mark_lost(connection, err).await;
            }
        }
        result
    }

    /// Runs one primitive against the connection, racing the operation timeout.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<K::Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let connection = self.connection().await?;
        match tokio::time::timeout(self.options.op_timeout(), op(Arc::clone(&connection))).await
        {
            Ok(result) => self.observe(&connection, result).await,
            Err(_) => Err(CacheError::Timeout(self.options.op_timeout_ms)),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(|conn| async move { conn.get(key).await }).await
    }

    /// Serializes `value` as JSON and stores it with `ttl`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let raw = encode_value(value)?;
        self.set_raw(key, &raw, ttl).await
    }

    /// Stores an already-serialized value with `ttl`.
    pub async fn set_raw(&self, key: &str, raw: &str, ttl: Duration) -> Result<()> {
        self.run(|conn| async move { conn.set_with_ttl(key, raw, ttl).await })
            .await
    }

    /// Adds `member` to the set at `key`. The set expires after `ttl * 1.5`
    /// so it outlives every member registered with the same `ttl`.
    pub async fn add_to_set(&self, key: &str, member: &str, ttl: Duration) -> Result<()> {
        let set_ttl = group_ttl(ttl);
        self.run(|conn| async move { conn.add_to_set(key, member, set_ttl).await })
            .await
    }

    /// Adds `values` to the set at `key`, returning how many were new.
    pub async fn create_set(&self, key: &str, values: &[String]) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        self.run(|conn| async move { conn.create_set(key, values).await })
            .await
    }

    pub async fn pop_from_set(&self, key: &str) -> Result<Option<String>> {
        self.run(|conn| async move { conn.pop_from_set(key).await })
            .await
    }

    pub async fn get_set_members(&self, key: &str) -> Result<Vec<String>> {
        self.run(|conn| async move { conn.set_members(key).await })
            .await
    }

    /// Deletes `keys` in one call. No-op for an empty slice.
    pub async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(|conn| async move { conn.delete(keys).await })
            .await
    }

    /// Deletes every key matching `pattern` using the client's scan options.
    pub async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        self.delete_matching_with(pattern, self.scan).await
    }

    /// Deletes every key matching `pattern`, scanning with a cursor.
    ///
    /// Matches accumulate across rounds and are deleted whenever more than
    /// `delete_batch` are pending, so memory stays bounded on large keyspaces.
    /// All rounds reuse one connection. Returns the number of keys deleted.
    pub async fn delete_matching_with(&self, pattern: &str, scan: ScanOptions) -> Result<u64> {
        if pattern.is_empty() {
            return Ok(0);
        }

        let connection = self.connection().await?;
        let mut cursor = 0;
        let mut pending: Vec<String> = Vec::new();
        let mut deleted = 0;
        let mut rounds = 0;

        loop {
            let scanned = connection.scan(cursor, pattern, scan.scan_count).await;
            let (next_cursor, keys) = self.observe(&connection, scanned).await?;
            rounds += 1;
            pending.extend(keys);

            if pending.len() > scan.delete_batch {
                let removed = connection.delete(&pending).await;
                deleted += self.observe(&connection, removed).await?;
                pending.clear();
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        if !pending.is_empty() {
            let removed = connection.delete(&pending).await;
            deleted += self.observe(&connection, removed).await?;
        }

        tracing::debug!(pattern, rounds, deleted, "Deleted matching keys");
        Ok(deleted)
    }

    /// Deletes everything in the store. Restrict to tests and operations.
    pub async fn flush(&self) -> Result<()> {
        let connection = self.connection().await?;
        let flushed = connection.flush_all().await;
        self.observe(&connection, flushed).await
    }
}

/// TTL of a group set whose members live for `ttl`.
///
/// Saturates at `Duration::MAX`.
pub fn group_ttl(ttl: Duration) -> Duration {
    ttl.checked_mul(3).map_or(Duration::MAX, |tripled| tripled / 2)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
