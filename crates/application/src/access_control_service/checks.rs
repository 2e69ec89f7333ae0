use super::*;

/// Effective permission set with the ttl it may be cached for.
struct EffectiveSnapshot {
    permissions: BTreeSet<PermissionKey>,
    ttl_seconds: u64,
}

impl AccessControlService {
    /// Returns the complete permission set of a user in a retreat: resolved
    /// direct permissions, inherited permissions of every held role and
    /// delegated permissions, adjusted by overrides.
    pub async fn effective_permissions(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<BTreeSet<PermissionKey>> {
        let cache_key = keys::retreat_user(retreat_id, user_id);
        if let Some(permissions) = self
            .cache
            .get::<BTreeSet<PermissionKey>>(CacheNamespace::Effective, &cache_key)
            .await
        {
            return Ok(permissions);
        }

        let generation = self.cache.generation();
        let snapshot = self.compute_effective(user_id, retreat_id).await?;
        self.cache
            .set_with_ttl(
                CacheNamespace::Effective,
                &cache_key,
                &snapshot.permissions,
                snapshot.ttl_seconds,
                generation,
            )
            .await;

        Ok(snapshot.permissions)
    }

    /// Returns whether the user holds the permission in the retreat.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        permission: &PermissionKey,
    ) -> AppResult<bool> {
        let cache_key = keys::retreat_user_permission(retreat_id, user_id, permission);
        if let Some(decision) = self
            .cache
            .get::<bool>(CacheNamespace::PermissionCheck, &cache_key)
            .await
        {
            return Ok(decision);
        }

        let generation = self.cache.generation();
        let snapshot = self.compute_effective(user_id, retreat_id).await?;
        let decision = snapshot.permissions.contains(permission);
        self.cache
            .set_with_ttl(
                CacheNamespace::Effective,
                &keys::retreat_user(retreat_id, user_id),
                &snapshot.permissions,
                snapshot.ttl_seconds,
                generation,
            )
            .await;
        self.cache
            .set_with_ttl(
                CacheNamespace::PermissionCheck,
                &cache_key,
                &decision,
                snapshot.ttl_seconds,
                generation,
            )
            .await;

        Ok(decision)
    }

    /// Returns whether the user may enter the retreat at all.
    pub async fn has_retreat_access(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        self.authority.has_retreat_access(user_id, retreat_id).await
    }

    /// Returns whether the user holds the named global role.
    pub async fn has_role(&self, user_id: UserId, role_name: &str) -> AppResult<bool> {
        self.authority.has_global_role(user_id, role_name).await
    }

    /// Returns whether the user holds the named role in the retreat.
    pub async fn has_retreat_role(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_name: &str,
    ) -> AppResult<bool> {
        self.authority
            .has_retreat_role(user_id, retreat_id, role_name)
            .await
    }

    /// Direct ownership check that ignores roles and caches.
    pub async fn is_retreat_creator(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        self.authority.is_retreat_creator(user_id, retreat_id).await
    }

    /// Returns every permission the role yields in the retreat through
    /// inheritance.
    pub async fn get_inherited_permissions(
        &self,
        role_name: &str,
        retreat_id: RetreatId,
    ) -> AppResult<BTreeSet<PermissionKey>> {
        self.inheritance.expand(role_name, retreat_id).await
    }

    async fn compute_effective(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<EffectiveSnapshot> {
        let now = Utc::now();
        let resolved = self.resolver.resolve(user_id, Some(retreat_id)).await?;
        let mut permissions = resolved.permissions.clone();
        let mut condition_expiry: Option<DateTime<Utc>> = None;

        for role_name in resolved
            .retreat_roles
            .iter()
            .chain(resolved.global_roles.iter())
        {
            let inherited = self.inheritance.expand_detailed(role_name, retreat_id).await?;
            condition_expiry = [condition_expiry, inherited.condition_expiry]
                .into_iter()
                .flatten()
                .min();
            permissions.extend(inherited.permissions);
        }

        // Grants only widen an existing surface; denials always hold.
        let has_access = resolved.retreat_specific_role.is_some()
            || resolved.global_roles.contains(SUPERADMIN_ROLE);

        let mut delegation_expiry = None;
        if has_access {
            let delegated = self
                .delegations
                .delegated_permissions(user_id, retreat_id)
                .await?;
            permissions.extend(delegated.permissions);
            delegation_expiry = delegated.earliest_expiry;
        }

        let applied = self
            .overrides
            .apply_detailed(permissions, user_id, retreat_id, has_access)
            .await?;

        let expiry = [
            delegation_expiry,
            condition_expiry,
            applied.next_expiry,
            resolved.earliest_membership_expiry(Some(retreat_id)),
        ]
        .into_iter()
        .flatten()
        .min();

        Ok(EffectiveSnapshot {
            permissions: applied.permissions,
            ttl_seconds: self.cache.ttl_until(expiry, now),
        })
    }
}
