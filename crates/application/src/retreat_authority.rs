use std::sync::Arc;

use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use retreat_access_domain::{PermissionKey, SUPERADMIN_ROLE};

use crate::cache_store::keys;
use crate::{CacheNamespace, CacheStore, RetreatRepository, RolePermissionResolver};

/// Role and ownership checks shared by every mutating service.
#[derive(Clone)]
pub struct RetreatAuthority {
    resolver: RolePermissionResolver,
    retreats: Arc<dyn RetreatRepository>,
    cache: CacheStore,
}

impl RetreatAuthority {
    /// Creates an authority helper.
    #[must_use]
    pub fn new(
        resolver: RolePermissionResolver,
        retreats: Arc<dyn RetreatRepository>,
        cache: CacheStore,
    ) -> Self {
        Self {
            resolver,
            retreats,
            cache,
        }
    }

    /// Returns whether the user holds the named global role.
    pub async fn has_global_role(&self, user_id: UserId, role_name: &str) -> AppResult<bool> {
        let cache_key = keys::user_role(user_id, role_name);
        if let Some(decision) = self
            .cache
            .get::<bool>(CacheNamespace::GlobalRole, &cache_key)
            .await
        {
            return Ok(decision);
        }

        let generation = self.cache.generation();
        let decision = self
            .resolver
            .resolve(user_id, None)
            .await?
            .global_roles
            .contains(role_name);

        self.cache
            .set(CacheNamespace::GlobalRole, &cache_key, &decision, generation)
            .await;

        Ok(decision)
    }

    /// Returns whether the user is a superadmin.
    pub async fn is_superadmin(&self, user_id: UserId) -> AppResult<bool> {
        self.has_global_role(user_id, SUPERADMIN_ROLE).await
    }

    /// Returns whether the user administers the whole system. Only global
    /// roles count; `system:admin` granted inside a retreat does not.
    pub async fn is_system_admin(&self, user_id: UserId) -> AppResult<bool> {
        if self.is_superadmin(user_id).await? {
            return Ok(true);
        }

        Ok(self
            .resolver
            .resolve(user_id, None)
            .await?
            .global_permissions
            .contains(&PermissionKey::system_admin()))
    }

    /// Returns whether the user created the retreat. Unknown retreats yield `false`.
    pub async fn is_retreat_creator(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        Ok(self
            .retreats
            .find_retreat(retreat_id)
            .await?
            .is_some_and(|retreat| retreat.created_by == user_id))
    }

    /// Returns whether the user has any live role in the retreat. Superadmins
    /// always do.
    pub async fn has_retreat_access(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        if self.is_superadmin(user_id).await? {
            return Ok(true);
        }

        let cache_key = keys::user_retreat(user_id, retreat_id);
        if let Some(decision) = self
            .cache
            .get::<bool>(CacheNamespace::RetreatAccess, &cache_key)
            .await
        {
            return Ok(decision);
        }

        let generation = self.cache.generation();
        let resolved = self.resolver.resolve(user_id, Some(retreat_id)).await?;
        let decision = resolved.retreat_specific_role.is_some();
        let ttl = self.cache.ttl_until(
            resolved.earliest_membership_expiry(Some(retreat_id)),
            chrono::Utc::now(),
        );

        self.cache
            .set_with_ttl(
                CacheNamespace::RetreatAccess,
                &cache_key,
                &decision,
                ttl,
                generation,
            )
            .await;

        Ok(decision)
    }

    /// Returns whether the user holds the named role in the retreat.
    pub async fn has_retreat_role(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_name: &str,
    ) -> AppResult<bool> {
        let cache_key = keys::user_retreat_role(user_id, retreat_id, role_name);
        if let Some(decision) = self
            .cache
            .get::<bool>(CacheNamespace::RetreatRole, &cache_key)
            .await
        {
            return Ok(decision);
        }

        let generation = self.cache.generation();
        let resolved = self.resolver.resolve(user_id, Some(retreat_id)).await?;
        let decision = resolved.retreat_roles.contains(role_name);
        let ttl = self.cache.ttl_until(
            resolved.earliest_membership_expiry(Some(retreat_id)),
            chrono::Utc::now(),
        );

        self.cache
            .set_with_ttl(
                CacheNamespace::RetreatRole,
                &cache_key,
                &decision,
                ttl,
                generation,
            )
            .await;

        Ok(decision)
    }

    /// Returns whether the user may administer the retreat: its creator,
    /// a superadmin or a system administrator.
    pub async fn is_retreat_manager(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        if self.is_retreat_creator(user_id, retreat_id).await? {
            return Ok(true);
        }

        self.is_system_admin(user_id).await
    }

    /// Fails with `Forbidden` unless the user may administer the retreat.
    pub async fn require_retreat_manager(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<()> {
        if self.is_retreat_manager(user_id, retreat_id).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{user_id}' may not manage access in retreat '{retreat_id}'"
        )))
    }

    /// Fails with `Forbidden` unless the user administers the system.
    pub async fn require_system_admin(&self, user_id: UserId) -> AppResult<()> {
        if self.is_system_admin(user_id).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{user_id}' lacks permission '{}'",
            PermissionKey::system_admin()
        )))
    }
}
