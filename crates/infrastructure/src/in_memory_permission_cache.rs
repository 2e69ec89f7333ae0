use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use retreat_access_application::{CacheNamespace, PermissionCache};
use retreat_access_core::AppResult;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct PermissionCacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Process-local permission cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct InMemoryPermissionCache {
    namespaces: RwLock<HashMap<CacheNamespace, HashMap<String, PermissionCacheEntry>>>,
}

impl InMemoryPermissionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut namespaces = self.namespaces.write().await;
        let mut removed = 0;
        for entries in namespaces.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            removed += before - entries.len();
        }
        removed
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.namespaces.read().await.values().map(HashMap::len).sum()
    }

    /// Returns whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PermissionCache for InMemoryPermissionCache {
    async fn get(&self, namespace: CacheNamespace, key: &str) -> AppResult<Option<Value>> {
        {
            let namespaces = self.namespaces.read().await;
            match namespaces.get(&namespace).and_then(|entries| entries.get(key)) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut namespaces = self.namespaces.write().await;
        if let Some(entries) = namespaces.get_mut(&namespace)
            && entries
                .get(key)
                .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: Value,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_seconds))
            .unwrap_or(now);

        self.namespaces
            .write()
            .await
            .entry(namespace)
            .or_default()
            .insert(key.to_owned(), PermissionCacheEntry { value, expires_at });

        Ok(())
    }

    async fn invalidate_prefix(
        &self,
        namespace: CacheNamespace,
        key_prefix: &str,
    ) -> AppResult<u64> {
        let mut namespaces = self.namespaces.write().await;
        let Some(entries) = namespaces.get_mut(&namespace) else {
            return Ok(0);
        };

        let before = entries.len();
        if key_prefix.is_empty() {
            entries.clear();
        } else {
            entries.retain(|key, _| !key.starts_with(key_prefix));
        }

        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use retreat_access_application::{CacheNamespace, PermissionCache};
    use serde_json::json;

    use super::InMemoryPermissionCache;

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = InMemoryPermissionCache::new();
        let stored = cache
            .set(CacheNamespace::Effective, "r1:u1", json!(["event:read"]), 60)
            .await;
        assert!(stored.is_ok());

        let value = cache.get(CacheNamespace::Effective, "r1:u1").await;
        assert!(matches!(value, Ok(Some(ref found)) if *found == json!(["event:read"])));
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let cache = InMemoryPermissionCache::new();
        let stored = cache
            .set(CacheNamespace::Resolved, "u1", json!(true), 0)
            .await;
        assert!(stored.is_ok());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let cache = InMemoryPermissionCache::new();
        let _ = cache
            .set(CacheNamespace::GlobalRole, "u1:superadmin", json!(true), 60)
            .await;

        let value = cache.get(CacheNamespace::RetreatRole, "u1:superadmin").await;
        assert!(matches!(value, Ok(None)));
    }

    #[tokio::test]
    async fn prefix_invalidation_only_touches_matching_keys() {
        let cache = InMemoryPermissionCache::new();
        let _ = cache
            .set(CacheNamespace::Effective, "r1:u1", json!([]), 60)
            .await;
        let _ = cache
            .set(CacheNamespace::Effective, "r1:u2", json!([]), 60)
            .await;
        let _ = cache
            .set(CacheNamespace::Effective, "r2:u1", json!([]), 60)
            .await;

        let removed = cache
            .invalidate_prefix(CacheNamespace::Effective, "r1:u1")
            .await;
        assert!(matches!(removed, Ok(1)));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn empty_prefix_clears_the_namespace() {
        let cache = InMemoryPermissionCache::new();
        let _ = cache
            .set(CacheNamespace::Inherited, "r1:coordinator", json!([]), 60)
            .await;
        let _ = cache
            .set(CacheNamespace::Inherited, "r2:volunteer", json!([]), 60)
            .await;
        let _ = cache
            .set(CacheNamespace::Memberships, "u1", json!([]), 60)
            .await;

        let removed = cache.invalidate_prefix(CacheNamespace::Inherited, "").await;
        assert!(matches!(removed, Ok(2)));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = InMemoryPermissionCache::new();
        let _ = cache
            .set(CacheNamespace::PermissionCheck, "r1:u1:event:read", json!(true), 1)
            .await;

        std::thread::sleep(std::time::Duration::from_millis(1100));

        let value = cache
            .get(CacheNamespace::PermissionCheck, "r1:u1:event:read")
            .await;
        assert!(matches!(value, Ok(None)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let cache = InMemoryPermissionCache::new();
        let _ = cache
            .set(CacheNamespace::Resolved, "u1", json!({}), 1)
            .await;
        let _ = cache
            .set(CacheNamespace::Resolved, "u2", json!({}), 60)
            .await;

        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }
}
