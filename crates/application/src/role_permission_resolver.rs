use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use retreat_access_core::{AppResult, RetreatId, UserId};
use retreat_access_domain::{MembershipStatus, PermissionKey, RetreatMembership, Role, RoleId};
use serde::{Deserialize, Serialize};

use crate::cache_store::keys;
use crate::{CacheNamespace, CacheStore, MembershipRepository, RoleRepository};

/// One live retreat role held by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatRoleSummary {
    /// Retreat the role applies to.
    pub retreat_id: RetreatId,
    /// Role name.
    pub role_name: String,
    /// Membership status, pending or active.
    pub status: MembershipStatus,
    /// Membership expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Flattened view of a user's roles and direct permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccess {
    /// Direct permissions of every considered role.
    pub permissions: BTreeSet<PermissionKey>,
    /// Permissions contributed by global roles alone.
    pub global_permissions: BTreeSet<PermissionKey>,
    /// Names of every considered role.
    pub roles: BTreeSet<String>,
    /// Names of global roles.
    pub global_roles: BTreeSet<String>,
    /// Names of roles held in the requested retreat.
    pub retreat_roles: BTreeSet<String>,
    /// Every live retreat role the user holds.
    pub retreats: Vec<RetreatRoleSummary>,
    /// Representative role in the requested retreat, active before pending.
    pub retreat_specific_role: Option<String>,
}

impl ResolvedAccess {
    /// Earliest expiry among the considered memberships.
    #[must_use]
    pub fn earliest_membership_expiry(&self, retreat_id: Option<RetreatId>) -> Option<DateTime<Utc>> {
        self.retreats
            .iter()
            .filter(|summary| retreat_id.is_none_or(|retreat_id| summary.retreat_id == retreat_id))
            .filter_map(|summary| summary.expires_at)
            .min()
    }
}

/// Computes the direct permission view of a user from global roles and
/// retreat memberships.
#[derive(Clone)]
pub struct RolePermissionResolver {
    roles: Arc<dyn RoleRepository>,
    memberships: Arc<dyn MembershipRepository>,
    cache: CacheStore,
}

impl RolePermissionResolver {
    /// Creates a resolver from repository implementations.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        memberships: Arc<dyn MembershipRepository>,
        cache: CacheStore,
    ) -> Self {
        Self {
            roles,
            memberships,
            cache,
        }
    }

    /// Resolves a user's roles and direct permissions.
    ///
    /// With a retreat, only memberships in that retreat contribute beside
    /// global roles. Without one, every live membership contributes.
    pub async fn resolve(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
    ) -> AppResult<ResolvedAccess> {
        let cache_key = match retreat_id {
            Some(retreat_id) => keys::user_retreat(user_id, retreat_id),
            None => keys::user(user_id),
        };

        if let Some(resolved) = self
            .cache
            .get::<ResolvedAccess>(CacheNamespace::Resolved, &cache_key)
            .await
        {
            return Ok(resolved);
        }

        let generation = self.cache.generation();
        let now = Utc::now();
        let memberships = self.live_memberships(user_id, now).await?;
        let global_roles = self.roles.list_global_roles_for_user(user_id).await?;

        let membership_role_ids: Vec<RoleId> = memberships
            .iter()
            .map(|membership| membership.role_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let membership_roles: HashMap<RoleId, Role> = self
            .roles
            .list_roles_by_ids(&membership_role_ids)
            .await?
            .into_iter()
            .map(|role| (role.role_id(), role))
            .collect();

        let mut resolved = ResolvedAccess::default();
        let mut considered_role_ids = BTreeSet::new();
        let mut retreat_candidates: Vec<(MembershipStatus, String)> = Vec::new();

        for role in &global_roles {
            considered_role_ids.insert(role.role_id());
            resolved.global_roles.insert(role.name().to_owned());
        }

        // Memberships pointing at deleted roles are dropped silently.
        for membership in &memberships {
            let Some(role) = membership_roles.get(&membership.role_id) else {
                continue;
            };

            let role_name = role.name().to_owned();
            resolved.retreats.push(RetreatRoleSummary {
                retreat_id: membership.retreat_id,
                role_name: role_name.clone(),
                status: membership.status,
                expires_at: membership.expires_at,
            });

            if retreat_id.is_none_or(|retreat_id| membership.retreat_id == retreat_id) {
                considered_role_ids.insert(role.role_id());
                if retreat_id.is_some() {
                    resolved.retreat_roles.insert(role_name.clone());
                    retreat_candidates.push((membership.status, role_name));
                }
            }
        }

        let global_role_ids: Vec<RoleId> = global_roles.iter().map(Role::role_id).collect();
        resolved.global_permissions = self
            .roles
            .list_permissions_for_roles(&global_role_ids)
            .await?
            .into_iter()
            .collect();

        let considered_role_ids: Vec<RoleId> = considered_role_ids.into_iter().collect();
        resolved.permissions = self
            .roles
            .list_permissions_for_roles(&considered_role_ids)
            .await?
            .into_iter()
            .collect();

        resolved.roles = resolved
            .global_roles
            .iter()
            .chain(resolved.retreats.iter().filter_map(|summary| {
                retreat_id
                    .is_none_or(|retreat_id| summary.retreat_id == retreat_id)
                    .then_some(&summary.role_name)
            }))
            .cloned()
            .collect();

        retreat_candidates.sort_by(|left, right| {
            status_rank(left.0)
                .cmp(&status_rank(right.0))
                .then_with(|| left.1.cmp(&right.1))
        });
        resolved.retreat_specific_role = retreat_candidates
            .into_iter()
            .next()
            .map(|(_, role_name)| role_name);

        let ttl = self
            .cache
            .ttl_until(resolved.earliest_membership_expiry(retreat_id), now);
        self.cache
            .set_with_ttl(CacheNamespace::Resolved, &cache_key, &resolved, ttl, generation)
            .await;

        Ok(resolved)
    }

    async fn live_memberships(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RetreatMembership>> {
        let cache_key = keys::user(user_id);
        let memberships = match self
            .cache
            .get::<Vec<RetreatMembership>>(CacheNamespace::Memberships, &cache_key)
            .await
        {
            Some(memberships) => memberships,
            None => {
                let generation = self.cache.generation();
                let memberships = self.memberships.list_live_memberships_for_user(user_id).await?;
                self.cache
                    .set(CacheNamespace::Memberships, &cache_key, &memberships, generation)
                    .await;
                memberships
            }
        };

        // Expiry is re-checked on every read since cleanup runs on a timer.
        Ok(memberships
            .into_iter()
            .filter(|membership| membership.is_live_at(now))
            .collect())
    }
}

fn status_rank(status: MembershipStatus) -> u8 {
    match status {
        MembershipStatus::Active => 0,
        MembershipStatus::Pending => 1,
        MembershipStatus::Expired | MembershipStatus::Revoked => 2,
    }
}
