//! Group invalidation.
//!
//! Forgetting drops every entry registered in a group set, the set itself and
//! the given root key(s), then runs the resolver. Invalidation is best-effort:
//! deletions that fail are logged and the resolver still runs.

use std::future::Future;

use recall_core::cache::Connector;

use crate::remember::RememberCache;

impl<K: Connector> RememberCache<K> {
    /// Drops the identity group `id_key` and `root_key`, then returns
    /// `resolver(args)`.
    ///
    /// With `enabled == false` nothing is deleted; the resolver still runs.
    pub async fn forget_all<A, T, E, F, Fut>(
        &self,
        id_key: &str,
        root_key: &str,
        enabled: bool,
        resolver: F,
        args: A,
    ) -> Result<T, E>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if enabled {
            self.forget_set_values(id_key).await;
            self.forget_keys(&[root_key.to_string()]).await;
        }
        resolver(args).await
    }

    /// Drops the search group `search_key` and every key in `root_keys`, then
    /// returns `resolver(args)`.
    pub async fn forget_search<A, T, E, F, Fut>(
        &self,
        search_key: &str,
        root_keys: &[&str],
        enabled: bool,
        resolver: F,
        args: A,
    ) -> Result<T, E>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if enabled {
            self.forget_set_values(search_key).await;
            let root_keys: Vec<String> = root_keys.iter().map(|key| key.to_string()).collect();
            self.forget_keys(&root_keys).await;
        }
        resolver(args).await
    }

    /// Deletes the members of the set at `set_key`, then the set.
    async fn forget_set_values(&self, set_key: &str) {
        let members = match self.client.get_set_members(set_key).await {
            Ok(members) => members,
            Err(err) => {
                // Keep the set: it is the only record of what to forget.
                tracing::warn!(key = set_key, error = %err, "Unable to get group members");
                return;
            }
        };

        tracing::debug!(key = set_key, members = members.len(), "Forgetting group");
        self.forget_keys(&members).await;
        self.forget_keys(&[set_key.to_string()]).await;
    }

    async fn forget_keys(&self, keys: &[String]) {
        if let Err(err) = self.client.del(keys).await {
            tracing::warn!(keys = ?keys, error = %err, "Unable to delete keys");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use recall_core::cache::{StoreConnection, StoreOptions};

    use crate::client::StoreClient;
    use crate::remember::RememberCache;
    use crate::testing::FaultyStore;

    const TTL: Duration = Duration::from_secs(60);
    const ID_KEY: &str = "ns:user:idKey:id:7";
    const ROOT_KEY: &str = "ns:user:rootKey";

    async fn cache_over(store: &FaultyStore) -> RememberCache<FaultyStore> {
        let options = StoreOptions::new(5, 60, 50).unwrap();
        let client = StoreClient::connect(store.clone(), options).await.unwrap();
        RememberCache::new(Arc::new(client))
    }

    async fn populate(cache: &RememberCache<FaultyStore>, group: &str, key: &str) {
        cache
            .remember(group, key, TTL, true, |v: u32| async move { Ok::<_, anyhow::Error>(v) }, 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_forget_all_drops_group_and_root() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        populate(&cache, ID_KEY, "ns:user:id:7").await;
        populate(&cache, ID_KEY, "ns:user:id:7:name:ann-").await;
        populate(&cache, "ns:user:idKey:id:8", "ns:user:id:8").await;
        store
            .memory
            .set_with_ttl(ROOT_KEY, "[1,2]", TTL)
            .await
            .unwrap();

        let bump = |v: u32| async move { Ok::<_, anyhow::Error>(v + 1) };
        let updated = cache
            .forget_all(ID_KEY, ROOT_KEY, true, bump, 7)
            .await
            .unwrap();

        assert_eq!(updated, 8);
        assert!(!store.memory.contains("ns:user:id:7").await);
        assert!(!store.memory.contains("ns:user:id:7:name:ann-").await);
        assert!(!store.memory.contains(ID_KEY).await);
        assert!(!store.memory.contains(ROOT_KEY).await);
        // Other groups are untouched.
        assert!(store.memory.contains("ns:user:id:8").await);
    }

    #[tokio::test]
    async fn test_forget_all_runs_resolver_when_nothing_cached() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        let calls = AtomicUsize::new(0);

        cache
            .forget_all(
                ID_KEY,
                ROOT_KEY,
                true,
                |_| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(())
                },
                (),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forget_all_disabled_keeps_entries() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        populate(&cache, ID_KEY, "ns:user:id:7").await;
        let before = store.calls.load(Ordering::SeqCst);

        cache
            .forget_all(ID_KEY, ROOT_KEY, false, |_| async { Ok::<_, anyhow::Error>(()) }, ())
            .await
            .unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), before);
        assert!(store.memory.contains("ns:user:id:7").await);
    }

    #[tokio::test]
    async fn test_forget_all_is_best_effort() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        populate(&cache, ID_KEY, "ns:user:id:7").await;
        store.fail_operations(true);

        let result = cache
            .forget_all(ID_KEY, ROOT_KEY, true, |_| async { Ok::<_, anyhow::Error>("saved") }, ())
            .await
            .unwrap();

        assert_eq!(result, "saved");
        // Nothing could be deleted, including the group set.
        assert!(store.memory.contains(ID_KEY).await);
    }

    #[tokio::test]
    async fn test_forget_all_propagates_resolver_error() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        populate(&cache, ID_KEY, "ns:user:id:7").await;

        let result: Result<(), anyhow::Error> = cache
            .forget_all(ID_KEY, ROOT_KEY, true, |_| async { Err(anyhow::anyhow!("conflict")) }, ())
            .await;

        assert!(result.is_err());
        // Invalidation happened before the resolver ran.
        assert!(!store.memory.contains("ns:user:id:7").await);
    }

    #[tokio::test]
    async fn test_forget_search_drops_every_root_key() {
        let store = FaultyStore::new();
        let cache = cache_over(&store).await;
        let search_key = "ns:user:searchKey";
        cache
            .remember_search(
                search_key,
                "ns:user:name:ann",
                TTL,
                true,
                |_| async { Ok::<_, anyhow::Error>(vec![7]) },
                (),
            )
            .await
            .unwrap();
        for root in ["ns:user:rootKey", "ns:team:rootKey"] {
            store.memory.set_with_ttl(root, "[]", TTL).await.unwrap();
        }

        cache
            .forget_search(
                search_key,
                &["ns:user:rootKey", "ns:team:rootKey"],
                true,
                |_| async { Ok::<_, anyhow::Error>(()) },
                (),
            )
            .await
            .unwrap();

        assert!(store.memory.is_empty().await);
    }
}
