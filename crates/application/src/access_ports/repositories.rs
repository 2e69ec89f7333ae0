use async_trait::async_trait;
use chrono::{DateTime, Utc};

use retreat_access_core::{AppResult, RetreatId, UserId};
use retreat_access_domain::{MembershipStatus, PermissionKey, RetreatMembership, Role, RoleId};

/// Retreat projection consumed by ownership checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetreatRecord {
    /// Retreat identifier.
    pub retreat_id: RetreatId,
    /// Display name.
    pub name: String,
    /// User who created the retreat.
    pub created_by: UserId,
}

/// Repository port for roles, role grants and global role assignments.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Finds a role by its unique name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Lists roles for a set of ids. Unknown ids are omitted.
    async fn list_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>>;

    /// Lists the distinct permissions granted to a set of roles.
    async fn list_permissions_for_roles(&self, role_ids: &[RoleId])
    -> AppResult<Vec<PermissionKey>>;

    /// Lists roles assigned to a user outside any retreat.
    async fn list_global_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>>;

    /// Assigns a global role. Returns `false` when the assignment already existed.
    async fn assign_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool>;

    /// Removes a global role. Returns `false` when nothing was assigned.
    async fn remove_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool>;
}

/// Repository port for retreat memberships.
///
/// Rows are unique per (user, retreat, role); re-invitation rewrites the row.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Lists a user's pending and active memberships across retreats.
    async fn list_live_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RetreatMembership>>;

    /// Lists active memberships in one retreat.
    async fn list_active_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>>;

    /// Lists every membership row in one retreat regardless of status.
    async fn list_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>>;

    /// Finds the membership row for a (user, retreat, role) triple.
    async fn find_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
    ) -> AppResult<Option<RetreatMembership>>;

    /// Inserts or replaces the row for the membership's triple.
    async fn upsert_membership(&self, membership: RetreatMembership) -> AppResult<()>;

    /// Moves a row to `to` when its status is one of `from`. Returns whether a row changed.
    async fn transition_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool>;

    /// Marks live rows whose expiry has passed as expired. Returns the row count.
    async fn expire_memberships(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Repository port for retreat ownership lookups.
#[async_trait]
pub trait RetreatRepository: Send + Sync {
    /// Finds a retreat by id.
    async fn find_retreat(&self, retreat_id: RetreatId) -> AppResult<Option<RetreatRecord>>;
}
