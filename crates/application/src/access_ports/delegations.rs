use async_trait::async_trait;
use chrono::{DateTime, Utc};

use retreat_access_core::{AppResult, RetreatId, UserId};
use retreat_access_domain::{Delegation, DelegationId};

/// Repository port for runtime delegation grants.
#[async_trait]
pub trait DelegationRepository: Send + Sync {
    /// Persists a new delegation.
    async fn insert_delegation(&self, delegation: Delegation) -> AppResult<()>;

    /// Finds a delegation by id.
    async fn find_delegation(&self, delegation_id: DelegationId) -> AppResult<Option<Delegation>>;

    /// Lists active, unexpired delegations where the user is either party.
    async fn list_active_delegations_for_user(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Delegation>>;

    /// Lists every delegation in a retreat, newest first.
    async fn list_delegations_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>>;

    /// Moves an active delegation to revoked. Returns whether a row changed.
    async fn revoke_delegation(
        &self,
        delegation_id: DelegationId,
        revoked_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Marks active delegations past expiry as expired. Returns the row count.
    async fn expire_delegations(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
