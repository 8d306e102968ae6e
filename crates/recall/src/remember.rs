//! Compute-or-fetch caching.
//!
//! A remembered value is stored under its entry key and the entry key is
//! registered in a group set (an identity group or a search group). Dropping
//! the group later drops every entry registered under it; see the `forget`
//! operations.
//!
//! The cache fails open: a store error never fails the caller. Reads that
//! fail are misses and writes that fail are skipped, both with a warning.
//! Concurrent misses on the same key each run the resolver; there is no
//! request coalescing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use recall_core::cache::{decode_value, encode_if_present, Connector, Result as CacheResult};

use crate::client::StoreClient;

/// Remember/forget operations over a shared [`StoreClient`].
pub struct RememberCache<K: Connector> {
    pub(crate) client: Arc<StoreClient<K>>,
}

impl<K: Connector> Clone for RememberCache<K> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<K: Connector> RememberCache<K> {
    pub fn new(client: Arc<StoreClient<K>>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<StoreClient<K>> {
        &self.client
    }

    /// Returns the value cached under `key`, or runs `resolver(args)` and caches
    /// its result for `ttl`, registering `key` in the identity group `id_key`.
    ///
    /// With `enabled == false` the store is not touched at all.
    pub async fn remember<A, T, E, F, Fut>(
        &self,
        id_key: &str,
        key: &str,
        ttl: Duration,
        enabled: bool,
        resolver: F,
        args: A,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !enabled {
            return resolver(args).await;
        }
        self.remember_value(id_key, key, ttl, resolver, args).await
    }

    /// Same as [`remember`](Self::remember), registering `key` in the search
    /// group `search_key` instead, so search results can be invalidated
    /// independently from identity lookups.
    pub async fn remember_search<A, T, E, F, Fut>(
        &self,
        search_key: &str,
        key: &str,
        ttl: Duration,
        enabled: bool,
        resolver: F,
        args: A,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !enabled {
            return resolver(args).await;
        }
        self.remember_value(search_key, key, ttl, resolver, args)
            .await
    }

    async fn remember_value<A, T, E, F, Fut>(
        &self,
        group_key: &str,
        key: &str,
        ttl: Duration,
        resolver: F,
        args: A,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.cached(key).await {
            return Ok(cached);
        }

        let resolved = resolver(args).await?;
        self.store(group_key, key, ttl, &resolved).await;
        Ok(resolved)
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.client.get(key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                tracing::trace!(key, "Cache miss");
                return None;
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "Unable to get value for key");
                return None;
            }
        };

        match decode_value(&raw) {
            Ok(value) => {
                tracing::trace!(key, "Cache hit");
                Some(value)
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "Cached value could not be parsed");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, group_key: &str, key: &str, ttl: Duration, value: &T) {
        let raw = match encode_if_present(value) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(key, error = %err, "Unable to serialize remembered value");
                return;
            }
        };

        if let Err(err) = self.write_back(group_key, key, &raw, ttl).await {
            tracing::warn!(key, error = %err, "Unable to set remembered value");
        }
    }

    async fn write_back(
        &self,
        group_key: &str,
        key: &str,
        raw: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.client.set_raw(key, raw, ttl).await?;
        self.client.add_to_set(group_key, key, ttl).await
    }

    /// Deletes every key matching `pattern` (see `KeyBuilder::build_pattern`).
    pub async fn delete_matching(&self, pattern: &str) -> CacheResult<u64> {
        self.client.delete_matching(pattern).await
    }

    /// Deletes everything in the store.
    pub async fn flush(&self) -> CacheResult<()> {
        self.client.flush().await
    }
}
