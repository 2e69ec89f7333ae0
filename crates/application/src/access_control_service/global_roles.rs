use super::*;

impl AccessControlService {
    /// Assigns a global role. Returns `false` when the user already held it.
    pub async fn assign_global_role(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        role_name: &str,
    ) -> AppResult<bool> {
        self.authority.require_system_admin(actor.actor()).await?;
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' does not exist")))?;

        let assigned = self.roles.assign_global_role(user_id, role.role_id()).await?;
        if !assigned {
            return Ok(false);
        }

        self.cache.invalidate_global_roles(user_id).await;
        info!(user_id = %user_id, role = role.name(), "global role assigned");
        self.audit
            .record(
                AuditEvent::new(AuditAction::GlobalRoleAssigned, "user_role", user_id.to_string())
                    .by(actor)
                    .with_detail(format!("assigned global role '{}'", role.name())),
            )
            .await;

        Ok(true)
    }

    /// Removes a global role. Returns `false` when the user did not hold it.
    pub async fn revoke_global_role(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        role_name: &str,
    ) -> AppResult<bool> {
        self.authority.require_system_admin(actor.actor()).await?;
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' does not exist")))?;

        let removed = self.roles.remove_global_role(user_id, role.role_id()).await?;
        if !removed {
            return Ok(false);
        }

        self.cache.invalidate_global_roles(user_id).await;
        info!(user_id = %user_id, role = role.name(), "global role revoked");
        self.audit
            .record(
                AuditEvent::new(AuditAction::GlobalRoleRevoked, "user_role", user_id.to_string())
                    .by(actor)
                    .with_detail(format!("revoked global role '{}'", role.name())),
            )
            .await;

        Ok(true)
    }
}
