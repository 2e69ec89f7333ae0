use super::*;

use retreat_access_domain::{Delegation, DelegationId, OverrideEntry};

use crate::{CreateDelegationInput, DelegationCheck};

impl AccessControlService {
    /// Checks a prospective delegation against policy.
    pub async fn can_delegate_permissions(
        &self,
        from_user: UserId,
        to_user: UserId,
        retreat_id: RetreatId,
        permissions: &[PermissionKey],
    ) -> AppResult<DelegationCheck> {
        self.delegations
            .can_delegate(from_user, to_user, retreat_id, permissions)
            .await
    }

    /// Creates a delegation from the actor.
    pub async fn create_permission_delegation(
        &self,
        actor: &AuditContext,
        input: CreateDelegationInput,
    ) -> AppResult<Delegation> {
        self.delegations.create_delegation(actor, input).await
    }

    /// Revokes a delegation.
    pub async fn revoke_delegation(
        &self,
        actor: &AuditContext,
        delegation_id: DelegationId,
    ) -> AppResult<bool> {
        self.delegations.revoke(actor, delegation_id).await
    }

    /// Lists in-force delegations where the user is either party.
    pub async fn get_active_delegations(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
    ) -> AppResult<Vec<Delegation>> {
        self.delegations
            .get_active_delegations(user_id, retreat_id)
            .await
    }

    /// Replaces a user's overrides in a retreat.
    pub async fn set_permission_override(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
        entries: Vec<OverrideEntry>,
        reason: &str,
    ) -> AppResult<()> {
        self.overrides
            .set(actor, user_id, retreat_id, entries, reason)
            .await
    }

    /// Returns a user's stored overrides in a retreat.
    pub async fn get_permission_overrides(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<OverrideEntry>> {
        self.overrides.get(user_id, retreat_id).await
    }

    /// Deletes a user's overrides in a retreat.
    pub async fn clear_permission_overrides(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        self.overrides.clear(actor, user_id, retreat_id).await
    }
}
