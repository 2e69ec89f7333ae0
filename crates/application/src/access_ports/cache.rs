use async_trait::async_trait;
use retreat_access_core::AppResult;
use serde_json::Value;

/// Logical partitions of the permission cache.
///
/// User-keyed namespaces start every key with the user id; retreat-keyed
/// namespaces start with the retreat id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheNamespace {
    /// Live membership rows per user.
    Memberships,
    /// Resolver output per user, optionally per retreat.
    Resolved,
    /// Retreat access decisions.
    RetreatAccess,
    /// Global role checks.
    GlobalRole,
    /// Retreat role checks.
    RetreatRole,
    /// Expanded inheritance sets per retreat and role.
    Inherited,
    /// Effective permission sets per retreat and user.
    Effective,
    /// Single permission decisions per retreat, user and permission.
    PermissionCheck,
}

impl CacheNamespace {
    /// Every namespace, user-keyed first.
    pub const ALL: [Self; 8] = [
        Self::Memberships,
        Self::Resolved,
        Self::RetreatAccess,
        Self::GlobalRole,
        Self::RetreatRole,
        Self::Inherited,
        Self::Effective,
        Self::PermissionCheck,
    ];

    /// Namespaces whose keys start with a user id.
    pub const USER_KEYED: [Self; 5] = [
        Self::Memberships,
        Self::Resolved,
        Self::RetreatAccess,
        Self::GlobalRole,
        Self::RetreatRole,
    ];

    /// Namespaces whose keys start with a retreat id.
    pub const RETREAT_KEYED: [Self; 3] = [Self::Inherited, Self::Effective, Self::PermissionCheck];

    /// Returns the stable label used in logs and stats.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memberships => "memberships",
            Self::Resolved => "resolved",
            Self::RetreatAccess => "retreat_access",
            Self::GlobalRole => "global_role",
            Self::RetreatRole => "retreat_role",
            Self::Inherited => "inherited",
            Self::Effective => "effective",
            Self::PermissionCheck => "permission_check",
        }
    }
}

/// Process-local key/value port backing the permission cache.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Returns the unexpired value for a key.
    async fn get(&self, namespace: CacheNamespace, key: &str) -> AppResult<Option<Value>>;

    /// Stores a value with a ttl. A zero ttl must not store anything.
    async fn set(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: Value,
        ttl_seconds: u64,
    ) -> AppResult<()>;

    /// Removes every key in the namespace starting with the prefix.
    /// An empty prefix clears the namespace. Returns the removed count.
    async fn invalidate_prefix(&self, namespace: CacheNamespace, key_prefix: &str)
    -> AppResult<u64>;
}
