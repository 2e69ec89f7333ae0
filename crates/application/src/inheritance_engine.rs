use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use retreat_access_core::{AppResult, RetreatId};
use retreat_access_domain::{InheritanceRule, PermissionKey, RoleId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache_store::keys;
use crate::{
    CacheNamespace, CacheStore, InheritanceRuleRepository, MembershipRepository, RoleRepository,
};

/// Permissions held by active members of one retreat, loaded once per
/// expansion and only when a required condition is met.
struct RetreatConditionContext {
    permissions: BTreeSet<PermissionKey>,
    earliest_expiry: Option<DateTime<Utc>>,
}

/// Permissions a role yields through inheritance in one retreat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedPermissions {
    /// Direct and inherited permissions.
    pub permissions: BTreeSet<PermissionKey>,
    /// Earliest expiry among the memberships that satisfied an edge
    /// condition. The set may shrink once it passes.
    pub condition_expiry: Option<DateTime<Utc>>,
}

/// Expands roles through the inheritance graph.
#[derive(Clone)]
pub struct InheritanceEngine {
    roles: Arc<dyn RoleRepository>,
    memberships: Arc<dyn MembershipRepository>,
    rules: Arc<dyn InheritanceRuleRepository>,
    cache: CacheStore,
}

impl InheritanceEngine {
    /// Creates an inheritance engine.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        memberships: Arc<dyn MembershipRepository>,
        rules: Arc<dyn InheritanceRuleRepository>,
        cache: CacheStore,
    ) -> Self {
        Self {
            roles,
            memberships,
            rules,
            cache,
        }
    }

    /// Returns the role's direct permissions together with everything reachable
    /// through permission-inheriting edges whose conditions hold in the retreat.
    ///
    /// Cycles are tolerated; every role is expanded at most once. Unknown roles
    /// expand to nothing.
    pub async fn expand(
        &self,
        role_name: &str,
        retreat_id: RetreatId,
    ) -> AppResult<BTreeSet<PermissionKey>> {
        Ok(self.expand_detailed(role_name, retreat_id).await?.permissions)
    }

    /// Expands the role and reports when a condition that widened the set
    /// may stop holding.
    pub async fn expand_detailed(
        &self,
        role_name: &str,
        retreat_id: RetreatId,
    ) -> AppResult<InheritedPermissions> {
        let cache_key = keys::retreat_role(retreat_id, role_name);
        if let Some(inherited) = self
            .cache
            .get::<InheritedPermissions>(CacheNamespace::Inherited, &cache_key)
            .await
        {
            return Ok(inherited);
        }

        let generation = self.cache.generation();
        let now = Utc::now();
        let mut context: Option<RetreatConditionContext> = None;
        let mut permissions = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut pending = vec![role_name.to_owned()];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            permissions.extend(self.direct_permissions(&current).await?);

            for rule in self.rules.list_rules_for_parent(&current).await? {
                if !rule.inherit_permissions() || visited.contains(rule.child_role()) {
                    continue;
                }

                if !self
                    .conditions_hold(&rule, retreat_id, now, &mut context)
                    .await?
                {
                    debug!(
                        parent = rule.parent_role(),
                        child = rule.child_role(),
                        retreat_id = %retreat_id,
                        "inheritance edge inactive"
                    );
                    continue;
                }

                pending.push(rule.child_role().to_owned());
            }
        }

        let inherited = InheritedPermissions {
            permissions,
            condition_expiry: context.and_then(|context| context.earliest_expiry),
        };
        let ttl = self.cache.ttl_until(inherited.condition_expiry, now);
        self.cache
            .set_with_ttl(
                CacheNamespace::Inherited,
                &cache_key,
                &inherited,
                ttl,
                generation,
            )
            .await;

        Ok(inherited)
    }

    /// Returns the role followed by every role whose delegation rights it
    /// inherits, in discovery order.
    pub async fn delegation_roles(
        &self,
        role_name: &str,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<String>> {
        let now = Utc::now();
        let mut context: Option<RetreatConditionContext> = None;
        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([role_name.to_owned()]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            for rule in self.rules.list_rules_for_parent(&current).await? {
                if rule.inherit_delegation()
                    && !visited.contains(rule.child_role())
                    && self
                        .conditions_hold(&rule, retreat_id, now, &mut context)
                        .await?
                {
                    queue.push_back(rule.child_role().to_owned());
                }
            }

            ordered.push(current);
        }

        Ok(ordered)
    }

    async fn direct_permissions(&self, role_name: &str) -> AppResult<Vec<PermissionKey>> {
        let Some(role) = self.roles.find_role_by_name(role_name).await? else {
            return Ok(Vec::new());
        };

        self.roles
            .list_permissions_for_roles(&[role.role_id()])
            .await
    }

    async fn conditions_hold(
        &self,
        rule: &InheritanceRule,
        retreat_id: RetreatId,
        now: DateTime<Utc>,
        context: &mut Option<RetreatConditionContext>,
    ) -> AppResult<bool> {
        for condition in rule.conditions().iter().filter(|condition| condition.required) {
            if context.is_none() {
                *context = Some(self.load_condition_context(retreat_id, now).await?);
            }

            let satisfied = context
                .as_ref()
                .is_some_and(|context| context.permissions.contains(&condition.permission));
            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn load_condition_context(
        &self,
        retreat_id: RetreatId,
        now: DateTime<Utc>,
    ) -> AppResult<RetreatConditionContext> {
        let memberships: Vec<_> = self
            .memberships
            .list_active_memberships_for_retreat(retreat_id)
            .await?
            .into_iter()
            .filter(|membership| membership.is_active_at(now))
            .collect();

        let role_ids: Vec<RoleId> = memberships
            .iter()
            .map(|membership| membership.role_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(RetreatConditionContext {
            permissions: self
                .roles
                .list_permissions_for_roles(&role_ids)
                .await?
                .into_iter()
                .collect(),
            earliest_expiry: memberships
                .iter()
                .filter_map(|membership| membership.expires_at)
                .min(),
        })
    }
}

#[cfg(test)]
mod tests;
