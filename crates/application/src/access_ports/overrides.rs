use async_trait::async_trait;

use retreat_access_core::{AppResult, RetreatId, UserId};
use retreat_access_domain::PermissionOverride;

/// Repository port for per-user, per-retreat overrides.
///
/// Implementations must return entries in the order they were saved.
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    /// Finds the override record for a user in a retreat.
    async fn find_override(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Option<PermissionOverride>>;

    /// Replaces the whole record for the (user, retreat) pair atomically.
    async fn save_override(&self, record: PermissionOverride) -> AppResult<()>;

    /// Deletes the record. Returns whether one existed.
    async fn delete_override(&self, user_id: UserId, retreat_id: RetreatId) -> AppResult<bool>;
}
