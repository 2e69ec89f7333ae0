use super::*;

impl InMemoryAccessStore {
    pub(super) async fn list_memberships_where(
        &self,
        predicate: impl Fn(&RetreatMembership) -> bool,
    ) -> AppResult<Vec<RetreatMembership>> {
        let mut listed: Vec<RetreatMembership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|membership| predicate(membership))
            .cloned()
            .collect();
        listed.sort_by_key(|membership| membership.invited_at);
        Ok(listed)
    }

    pub(super) async fn upsert_membership_impl(
        &self,
        membership: RetreatMembership,
    ) -> AppResult<()> {
        if !self
            .retreats
            .read()
            .await
            .contains_key(&membership.retreat_id)
        {
            return Err(AppError::NotFound(format!(
                "retreat '{}' was not found",
                membership.retreat_id
            )));
        }

        if !self.roles.read().await.contains_key(&membership.role_id) {
            return Err(AppError::NotFound(format!(
                "role '{}' was not found",
                membership.role_id
            )));
        }

        self.memberships.write().await.insert(
            (membership.user_id, membership.retreat_id, membership.role_id),
            membership,
        );
        Ok(())
    }

    pub(super) async fn transition_membership_impl(
        &self,
        key: MembershipKey,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool> {
        let mut memberships = self.memberships.write().await;
        let Some(membership) = memberships
            .get_mut(&key)
            .filter(|membership| from.contains(&membership.status))
        else {
            return Ok(false);
        };

        membership.status = to;
        Ok(true)
    }

    pub(super) async fn expire_memberships_impl(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0_u64;
        for membership in self.memberships.write().await.values_mut() {
            if membership.status.is_live()
                && membership
                    .expires_at
                    .is_some_and(|expires_at| expires_at <= now)
            {
                membership.status = MembershipStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
