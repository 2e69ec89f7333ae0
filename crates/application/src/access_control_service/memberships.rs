use super::*;

impl AccessControlService {
    /// Grants a role in a retreat. Assigning a role the user already holds is
    /// a no-op; a revoked or expired row is reactivated.
    pub async fn assign_retreat_role(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
        role_name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<RetreatMembership> {
        self.require_retreat(retreat_id).await?;
        self.authority
            .require_retreat_manager(actor.actor(), retreat_id)
            .await?;

        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' does not exist")))?;

        let now = Utc::now();
        if expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "membership expires_at must be in the future".to_owned(),
            ));
        }

        if let Some(existing) = self
            .memberships
            .find_membership(user_id, retreat_id, role.role_id())
            .await?
            .filter(|existing| existing.is_live_at(now))
        {
            return Ok(existing);
        }

        let membership = RetreatMembership {
            user_id,
            retreat_id,
            role_id: role.role_id(),
            status: MembershipStatus::Active,
            invited_by: Some(actor.actor()),
            invited_at: now,
            expires_at,
        };
        self.memberships.upsert_membership(membership.clone()).await?;
        self.cache.invalidate_membership(user_id, retreat_id).await;

        info!(
            user_id = %user_id,
            retreat_id = %retreat_id,
            role = role.name(),
            "retreat role assigned"
        );
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::RetreatRoleAssigned,
                    "retreat_membership",
                    user_id.to_string(),
                )
                .in_retreat(retreat_id)
                .by(actor)
                .with_detail(format!("assigned role '{}'", role.name())),
            )
            .await;

        Ok(membership)
    }

    /// Revokes a live retreat role. Returns whether a row changed.
    pub async fn revoke_retreat_role(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
        role_name: &str,
    ) -> AppResult<bool> {
        self.require_retreat(retreat_id).await?;
        self.authority
            .require_retreat_manager(actor.actor(), retreat_id)
            .await?;

        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' does not exist")))?;

        let revoked = self
            .memberships
            .transition_membership(
                user_id,
                retreat_id,
                role.role_id(),
                &[MembershipStatus::Pending, MembershipStatus::Active],
                MembershipStatus::Revoked,
            )
            .await?;
        if !revoked {
            return Ok(false);
        }

        self.cache.invalidate_membership(user_id, retreat_id).await;

        info!(
            user_id = %user_id,
            retreat_id = %retreat_id,
            role = role.name(),
            "retreat role revoked"
        );
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::RetreatRoleRevoked,
                    "retreat_membership",
                    user_id.to_string(),
                )
                .in_retreat(retreat_id)
                .by(actor)
                .with_detail(format!("revoked role '{}'", role.name())),
            )
            .await;

        Ok(true)
    }

    /// Lists membership rows of a retreat for users with access to it. Rows
    /// whose role no longer exists are omitted.
    pub async fn list_retreat_members(
        &self,
        actor: &AuditContext,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMember>> {
        self.require_retreat(retreat_id).await?;
        if !self.authority.has_retreat_access(actor.actor(), retreat_id).await?
            && !self.authority.is_retreat_manager(actor.actor(), retreat_id).await?
        {
            return Err(AppError::Forbidden(format!(
                "user '{}' has no access to retreat '{retreat_id}'",
                actor.actor()
            )));
        }

        let memberships = self.memberships.list_memberships_for_retreat(retreat_id).await?;
        let role_ids: Vec<_> = memberships
            .iter()
            .map(|membership| membership.role_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let roles = self.roles.list_roles_by_ids(&role_ids).await?;

        Ok(memberships
            .into_iter()
            .filter_map(|membership| {
                let role_name = roles
                    .iter()
                    .find(|role| role.role_id() == membership.role_id)?
                    .name()
                    .to_owned();
                Some(RetreatMember {
                    membership,
                    role_name,
                })
            })
            .collect())
    }

    /// Marks lapsed memberships as expired. Returns the count.
    pub async fn expire_memberships(&self) -> AppResult<u64> {
        let expired = self.memberships.expire_memberships(Utc::now()).await?;
        if expired == 0 {
            return Ok(0);
        }

        self.cache.clear_all().await;
        info!(expired, "expired lapsed retreat memberships");
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::RetreatMembershipsExpired,
                    "retreat_membership",
                    "*",
                )
                .with_detail(format!("expired {expired} memberships")),
            )
            .await;

        Ok(expired)
    }

    async fn require_retreat(&self, retreat_id: RetreatId) -> AppResult<()> {
        if self.retreats.find_retreat(retreat_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "retreat '{retreat_id}' does not exist"
            )));
        }

        Ok(())
    }
}
