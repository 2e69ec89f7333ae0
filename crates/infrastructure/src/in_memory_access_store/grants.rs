use super::*;

impl InMemoryAccessStore {
    pub(super) async fn insert_delegation_impl(&self, delegation: Delegation) -> AppResult<()> {
        if !self
            .retreats
            .read()
            .await
            .contains_key(&delegation.retreat_id)
        {
            return Err(AppError::NotFound(format!(
                "retreat '{}' was not found",
                delegation.retreat_id
            )));
        }

        let mut delegations = self.delegations.write().await;
        if delegations.contains_key(&delegation.delegation_id) {
            return Err(AppError::Conflict(format!(
                "delegation '{}' already exists",
                delegation.delegation_id
            )));
        }

        delegations.insert(delegation.delegation_id, delegation);
        Ok(())
    }

    pub(super) async fn list_active_delegations_for_user_impl(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Delegation>> {
        let mut listed: Vec<Delegation> = self
            .delegations
            .read()
            .await
            .values()
            .filter(|delegation| {
                delegation.involves(user_id)
                    && delegation.is_active_at(now)
                    && retreat_id.is_none_or(|retreat_id| delegation.retreat_id == retreat_id)
            })
            .cloned()
            .collect();
        listed.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(listed)
    }

    pub(super) async fn list_delegations_for_retreat_impl(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>> {
        let mut listed: Vec<Delegation> = self
            .delegations
            .read()
            .await
            .values()
            .filter(|delegation| delegation.retreat_id == retreat_id)
            .cloned()
            .collect();
        listed.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(listed)
    }

    pub(super) async fn expire_delegations_impl(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0_u64;
        for delegation in self.delegations.write().await.values_mut() {
            if delegation.status == DelegationStatus::Active && delegation.expires_at <= now {
                delegation.status = DelegationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
