//! Repository-facing cache facade.
//!
//! Wraps [`RememberCache`] and a [`KeyBuilder`] behind the two calls a typical
//! "fetch by id columns" repository needs:
//!
//! - **Reads**: [`RepositoryCache::cache_simple_response`] remembers the
//!   resolver's result under the composite key of its arguments, grouped under
//!   their identity key
//! - **Writes**: [`RepositoryCache::invalidate_cache`] forgets the identity
//!   group and the prefix root key, then runs the resolver
//!
//! # Example
//!
//! ```ignore
//! let user = repo_cache
//!     .cache_simple_response(
//!         &["id"],
//!         "user",
//!         Duration::from_secs(300),
//!         true,
//!         |args| db.find_user(args),
//!         FindUser { id: 7, name: "Ann".into() },
//!         None,
//!     )
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use recall_core::cache::{
    to_record, ArgsMapper, Connector, KeyBuilder, KeyError, Result as CacheResult,
};

use crate::remember::RememberCache;

/// Keys plus remember/forget for one namespace.
pub struct RepositoryCache<K: Connector> {
    cache: RememberCache<K>,
    keys: KeyBuilder,
}

impl<K: Connector> Clone for RepositoryCache<K> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            keys: self.keys.clone(),
        }
    }
}

impl<K: Connector> RepositoryCache<K> {
    pub fn new(cache: RememberCache<K>, keys: KeyBuilder) -> Self {
        Self { cache, keys }
    }

    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    pub fn cache(&self) -> &RememberCache<K> {
        &self.cache
    }

    /// Returns the cached result for `args`, or runs `resolver(args)` and
    /// caches it for `ttl`.
    ///
    /// # Errors
    ///
    /// Fails with `KeyError::MissingIdColumns` (converted into `E`) when `args`
    /// lacks one of `id_columns`, even with `enabled == false`. Otherwise only
    /// the resolver's own errors are returned.
    #[allow(clippy::too_many_arguments)]
    pub async fn cache_simple_response<A, T, E, F, Fut>(
        &self,
        id_columns: &[&str],
        prefix: &str,
        ttl: Duration,
        enabled: bool,
        resolver: F,
        args: A,
        mapper: Option<&dyn ArgsMapper>,
    ) -> Result<T, E>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        E: From<KeyError>,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let record = to_record(&args)?;
        let id_key = self.keys.build_id_key(prefix, id_columns, &record, mapper)?;
        let key = self.keys.build_key(prefix, &record, mapper);

        self.cache
            .remember(&id_key, &key, ttl, enabled, resolver, args)
            .await
    }

    /// Forgets every cached result grouped under the identity of `args` and
    /// the root key of `prefix`, then returns `resolver(args)`.
    ///
    /// # Errors
    ///
    /// Same contract as [`cache_simple_response`](Self::cache_simple_response).
    pub async fn invalidate_cache<A, T, E, F, Fut>(
        &self,
        id_columns: &[&str],
        prefix: &str,
        enabled: bool,
        resolver: F,
        args: A,
        mapper: Option<&dyn ArgsMapper>,
    ) -> Result<T, E>
    where
        A: Serialize,
        E: From<KeyError>,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let record = to_record(&args)?;
        let id_key = self.keys.build_id_key(prefix, id_columns, &record, mapper)?;
        let root_key = self.keys.build_root_key(prefix);

        self.cache
            .forget_all(&id_key, &root_key, enabled, resolver, args)
            .await
    }

    /// Deletes every key in this namespace matching `custom_pattern`.
    pub async fn delete_matching(&self, custom_pattern: &str) -> CacheResult<u64> {
        let pattern = self.keys.build_pattern(custom_pattern);
        self.cache.delete_matching(&pattern).await
    }

    /// Deletes everything in the store, not only this namespace.
    pub async fn flush(&self) -> CacheResult<()> {
        self.cache.flush().await
    }
}
