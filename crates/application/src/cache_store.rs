use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use retreat_access_core::{RetreatId, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{CacheNamespace, PermissionCache};

/// Default ttl applied to cached permission data.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Counter snapshot exposed to operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that fell through to computation.
    pub misses: u64,
    /// Values written.
    pub writes: u64,
    /// Writes dropped because an invalidation raced the computation.
    pub stale_writes_dropped: u64,
    /// Prefix or namespace invalidations issued.
    pub invalidations: u64,
    /// Backend failures absorbed by the store.
    pub backend_errors: u64,
    /// Whether reads are bypassed until a full clear succeeds.
    pub degraded: bool,
}

/// Invalidation epoch captured before a computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration(u64);

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    stale_writes_dropped: AtomicU64,
    invalidations: AtomicU64,
    backend_errors: AtomicU64,
    generation: AtomicU64,
    degraded: AtomicBool,
}

/// Typed, namespaced front of the permission cache.
///
/// Cache failures never fail a permission check: reads degrade to misses and
/// failed writes are dropped. A failed invalidation switches the store into a
/// degraded mode where every read misses until a full clear succeeds, so a
/// stale positive can never be served.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn PermissionCache>,
    ttl_seconds: u64,
    counters: Arc<CacheCounters>,
}

impl CacheStore {
    /// Creates a cache store with the given default ttl.
    #[must_use]
    pub fn new(backend: Arc<dyn PermissionCache>, ttl_seconds: u64) -> Self {
        Self {
            backend,
            ttl_seconds,
            counters: Arc::new(CacheCounters::default()),
        }
    }

    /// Returns the default ttl in seconds.
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Captures the current invalidation epoch. Take it before reading any
    /// source data for a value that will be cached.
    #[must_use]
    pub fn generation(&self) -> CacheGeneration {
        CacheGeneration(self.counters.generation.load(Ordering::SeqCst))
    }

    /// Returns the default ttl, shortened so the entry dies no later than
    /// `expires_at`.
    #[must_use]
    pub fn ttl_until(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
        let Some(expires_at) = expires_at else {
            return self.ttl_seconds;
        };

        let remaining = (expires_at - now).num_seconds();
        if remaining <= 0 {
            return 0;
        }

        self.ttl_seconds
            .min(u64::try_from(remaining).unwrap_or(u64::MAX))
    }

    /// Reads and decodes a cached value. Errors and decode failures are misses.
    pub async fn get<T: DeserializeOwned>(&self, namespace: CacheNamespace, key: &str) -> Option<T> {
        if self.counters.degraded.load(Ordering::SeqCst) && !self.try_recover().await {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let value = match self.backend.get(namespace, key).await {
            Ok(value) => value,
            Err(error) => {
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(namespace = namespace.as_str(), %error, "permission cache read failed");
                None
            }
        };

        let decoded = value.and_then(|value| match serde_json::from_value::<T>(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(namespace = namespace.as_str(), %error, "discarding undecodable cache entry");
                None
            }
        });

        if decoded.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }

        decoded
    }

    /// Writes a value with the default ttl.
    pub async fn set<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
        generation: CacheGeneration,
    ) {
        self.set_with_ttl(namespace, key, value, self.ttl_seconds, generation)
            .await;
    }

    /// Writes a value unless an invalidation happened after `generation` was
    /// captured.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
        ttl_seconds: u64,
        generation: CacheGeneration,
    ) {
        if ttl_seconds == 0 || self.counters.degraded.load(Ordering::SeqCst) {
            return;
        }

        if self.generation() != generation {
            self.counters
                .stale_writes_dropped
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(error) => {
                warn!(namespace = namespace.as_str(), %error, "failed to encode cache entry");
                return;
            }
        };

        if let Err(error) = self.backend.set(namespace, key, value, ttl_seconds).await {
            self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
            warn!(namespace = namespace.as_str(), %error, "permission cache write failed");
            return;
        }

        // An invalidation may have landed between the check and the write.
        if self.generation() != generation {
            self.counters
                .stale_writes_dropped
                .fetch_add(1, Ordering::Relaxed);
            self.remove_own_write(namespace, key).await;
            return;
        }

        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Invalidates every key in the namespace starting with the prefix.
    pub async fn invalidate(&self, namespace: CacheNamespace, key_prefix: &str) {
        self.counters.generation.fetch_add(1, Ordering::SeqCst);
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        if let Err(error) = self.backend.invalidate_prefix(namespace, key_prefix).await {
            self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
            self.counters.degraded.store(true, Ordering::SeqCst);
            warn!(
                namespace = namespace.as_str(),
                key_prefix,
                %error,
                "permission cache invalidation failed; bypassing cache until cleared"
            );
        }
    }

    /// Clears a whole namespace.
    pub async fn clear_namespace(&self, namespace: CacheNamespace) {
        self.invalidate(namespace, "").await;
    }

    /// Clears every namespace.
    pub async fn clear_all(&self) {
        for namespace in CacheNamespace::ALL {
            self.clear_namespace(namespace).await;
        }
    }

    /// Drops entries affected by a membership change of one user in one retreat.
    pub async fn invalidate_membership(&self, user_id: UserId, retreat_id: RetreatId) {
        self.invalidate_user(user_id).await;

        // Inheritance conditions look at every active member of the retreat.
        let retreat_prefix = retreat_id.to_string();
        for namespace in CacheNamespace::RETREAT_KEYED {
            self.invalidate(namespace, &retreat_prefix).await;
        }
    }

    /// Drops the retreat-scoped grants of one user after a delegation or
    /// override change.
    pub async fn invalidate_grants(&self, user_id: UserId, retreat_id: RetreatId) {
        let prefix = keys::retreat_user(retreat_id, user_id);
        self.invalidate(CacheNamespace::Effective, &prefix).await;
        self.invalidate(CacheNamespace::PermissionCheck, &prefix)
            .await;
    }

    /// Drops everything derived from one user's global roles.
    pub async fn invalidate_global_roles(&self, user_id: UserId) {
        self.invalidate_user(user_id).await;
        for namespace in CacheNamespace::RETREAT_KEYED {
            self.clear_namespace(namespace).await;
        }
    }

    /// Drops every expanded inheritance set and everything built on it.
    pub async fn invalidate_role_hierarchy(&self) {
        for namespace in CacheNamespace::RETREAT_KEYED {
            self.clear_namespace(namespace).await;
        }
    }

    /// Drops every effective set after bulk delegation expiry.
    pub async fn invalidate_all_grants(&self) {
        self.clear_namespace(CacheNamespace::Effective).await;
        self.clear_namespace(CacheNamespace::PermissionCheck).await;
    }

    /// Returns a counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            stale_writes_dropped: self.counters.stale_writes_dropped.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
            degraded: self.counters.degraded.load(Ordering::SeqCst),
        }
    }

    async fn invalidate_user(&self, user_id: UserId) {
        let user_prefix = user_id.to_string();
        for namespace in CacheNamespace::USER_KEYED {
            self.invalidate(namespace, &user_prefix).await;
        }
    }

    async fn remove_own_write(&self, namespace: CacheNamespace, key: &str) {
        if let Err(error) = self.backend.invalidate_prefix(namespace, key).await {
            self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
            self.counters.degraded.store(true, Ordering::SeqCst);
            warn!(namespace = namespace.as_str(), %error, "failed to remove raced cache entry");
        }
    }

    async fn try_recover(&self) -> bool {
        for namespace in CacheNamespace::ALL {
            if self.backend.invalidate_prefix(namespace, "").await.is_err() {
                return false;
            }
        }

        self.counters.generation.fetch_add(1, Ordering::SeqCst);
        self.counters.degraded.store(false, Ordering::SeqCst);
        true
    }
}

/// Key builders shared by every cache user. Ids are fixed-width so a bare id
/// is a safe prefix.
pub(crate) mod keys {
    use retreat_access_core::{RetreatId, UserId};
    use retreat_access_domain::PermissionKey;

    pub(crate) fn user(user_id: UserId) -> String {
        user_id.to_string()
    }

    pub(crate) fn user_retreat(user_id: UserId, retreat_id: RetreatId) -> String {
        format!("{user_id}:{retreat_id}")
    }

    pub(crate) fn user_role(user_id: UserId, role_name: &str) -> String {
        format!("{user_id}:{role_name}")
    }

    pub(crate) fn user_retreat_role(user_id: UserId, retreat_id: RetreatId, role_name: &str) -> String {
        format!("{user_id}:{retreat_id}:{role_name}")
    }

    pub(crate) fn retreat_role(retreat_id: RetreatId, role_name: &str) -> String {
        format!("{retreat_id}:{role_name}")
    }

    pub(crate) fn retreat_user(retreat_id: RetreatId, user_id: UserId) -> String {
        format!("{retreat_id}:{user_id}")
    }

    pub(crate) fn retreat_user_permission(
        retreat_id: RetreatId,
        user_id: UserId,
        permission: &PermissionKey,
    ) -> String {
        format!("{retreat_id}:{user_id}:{permission}")
    }
}
