use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retreat_access_application::{
    AuditEvent, AuditRepository, DelegationRepository, DelegationRuleRepository,
    InheritanceRuleRepository, MembershipRepository, OverrideRepository, RetreatRecord,
    RetreatRepository, RoleRepository,
};
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use retreat_access_domain::{
    Delegation, DelegationId, DelegationRule, DelegationStatus, InheritanceRule, MembershipStatus,
    PermissionKey, PermissionOverride, RetreatMembership, Role, RoleId,
};
use tokio::sync::RwLock;
use tracing::debug;

mod grants;
mod memberships;
mod policy;
mod roles;


type MembershipKey = (UserId, RetreatId, RoleId);

/// In-memory implementation of every access repository port.
///
/// Backs the API when no `DATABASE_URL` is configured and keeps state for the
/// lifetime of the process only.
#[derive(Debug, Default)]
pub struct InMemoryAccessStore {
    roles: RwLock<HashMap<RoleId, Role>>,
    role_permissions: RwLock<HashMap<RoleId, BTreeSet<PermissionKey>>>,
    global_roles: RwLock<BTreeSet<(UserId, RoleId)>>,
    retreats: RwLock<HashMap<RetreatId, RetreatRecord>>,
    memberships: RwLock<HashMap<MembershipKey, RetreatMembership>>,
    delegations: RwLock<HashMap<DelegationId, Delegation>>,
    overrides: RwLock<HashMap<(UserId, RetreatId), PermissionOverride>>,
    inheritance_rules: RwLock<Vec<InheritanceRule>>,
    delegation_rules: RwLock<Vec<DelegationRule>>,
    audit_events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAccessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a role with its permission grants. Role names are unique.
    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        permissions: impl IntoIterator<Item = PermissionKey>,
    ) -> AppResult<Role> {
        let role = Role::new(RoleId::new(), name, description)?;
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| existing.name() == role.name()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        self.role_permissions
            .write()
            .await
            .insert(role.role_id(), permissions.into_iter().collect());
        roles.insert(role.role_id(), role.clone());
        debug!(role = role.name(), "role created in memory");

        Ok(role)
    }

    /// Registers a retreat owned by `created_by`.
    pub async fn create_retreat(&self, name: &str, created_by: UserId) -> RetreatRecord {
        let record = RetreatRecord {
            retreat_id: RetreatId::new(),
            name: name.trim().to_owned(),
            created_by,
        };
        self.retreats
            .write()
            .await
            .insert(record.retreat_id, record.clone());
        record
    }

    /// Returns every appended audit event in insertion order.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.read().await.clone()
    }
}

#[async_trait]
impl RetreatRepository for InMemoryAccessStore {
    async fn find_retreat(&self, retreat_id: RetreatId) -> AppResult<Option<RetreatRecord>> {
        Ok(self.retreats.read().await.get(&retreat_id).cloned())
    }
}

#[async_trait]
impl AuditRepository for InMemoryAccessStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.audit_events.write().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccessStore {
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.find_role_by_name_impl(name).await
    }

    async fn list_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        self.list_roles_by_ids_impl(role_ids).await
    }

    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<PermissionKey>> {
        self.list_permissions_for_roles_impl(role_ids).await
    }

    async fn list_global_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.list_global_roles_for_user_impl(user_id).await
    }

    async fn assign_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        self.assign_global_role_impl(user_id, role_id).await
    }

    async fn remove_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        Ok(self.global_roles.write().await.remove(&(user_id, role_id)))
    }
}

#[async_trait]
impl MembershipRepository for InMemoryAccessStore {
    async fn list_live_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_memberships_where(|membership| {
            membership.user_id == user_id && membership.status.is_live()
        })
        .await
    }

    async fn list_active_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_memberships_where(|membership| {
            membership.retreat_id == retreat_id && membership.status == MembershipStatus::Active
        })
        .await
    }

    async fn list_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_memberships_where(|membership| membership.retreat_id == retreat_id)
            .await
    }

    async fn find_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
    ) -> AppResult<Option<RetreatMembership>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(user_id, retreat_id, role_id))
            .cloned())
    }

    async fn upsert_membership(&self, membership: RetreatMembership) -> AppResult<()> {
        self.upsert_membership_impl(membership).await
    }

    async fn transition_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool> {
        self.transition_membership_impl((user_id, retreat_id, role_id), from, to)
            .await
    }

    async fn expire_memberships(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.expire_memberships_impl(now).await
    }
}

#[async_trait]
impl DelegationRepository for InMemoryAccessStore {
    async fn insert_delegation(&self, delegation: Delegation) -> AppResult<()> {
        self.insert_delegation_impl(delegation).await
    }

    async fn find_delegation(&self, delegation_id: DelegationId) -> AppResult<Option<Delegation>> {
        Ok(self.delegations.read().await.get(&delegation_id).cloned())
    }

    async fn list_active_delegations_for_user(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Delegation>> {
        self.list_active_delegations_for_user_impl(user_id, retreat_id, now)
            .await
    }

    async fn list_delegations_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>> {
        self.list_delegations_for_retreat_impl(retreat_id).await
    }

    async fn revoke_delegation(
        &self,
        delegation_id: DelegationId,
        revoked_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut delegations = self.delegations.write().await;
        let Some(delegation) = delegations
            .get_mut(&delegation_id)
            .filter(|delegation| delegation.status == DelegationStatus::Active)
        else {
            return Ok(false);
        };

        delegation.status = DelegationStatus::Revoked;
        delegation.revoked_at = Some(now);
        delegation.revoked_by = Some(revoked_by);
        Ok(true)
    }

    async fn expire_delegations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.expire_delegations_impl(now).await
    }
}

#[async_trait]
impl OverrideRepository for InMemoryAccessStore {
    async fn find_override(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Option<PermissionOverride>> {
        Ok(self
            .overrides
            .read()
            .await
            .get(&(user_id, retreat_id))
            .cloned())
    }

    async fn save_override(&self, record: PermissionOverride) -> AppResult<()> {
        self.overrides
            .write()
            .await
            .insert((record.user_id, record.retreat_id), record);
        Ok(())
    }

    async fn delete_override(&self, user_id: UserId, retreat_id: RetreatId) -> AppResult<bool> {
        Ok(self
            .overrides
            .write()
            .await
            .remove(&(user_id, retreat_id))
            .is_some())
    }
}

#[async_trait]
impl InheritanceRuleRepository for InMemoryAccessStore {
    async fn list_inheritance_rules(&self) -> AppResult<Vec<InheritanceRule>> {
        self.list_inheritance_rules_impl().await
    }

    async fn list_rules_for_parent(&self, parent_role: &str) -> AppResult<Vec<InheritanceRule>> {
        Ok(self
            .inheritance_rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.parent_role() == parent_role)
            .cloned()
            .collect())
    }

    async fn add_inheritance_rule(&self, rule: InheritanceRule) -> AppResult<()> {
        self.add_inheritance_rule_impl(rule).await
    }

    async fn remove_inheritance_rule(
        &self,
        parent_role: &str,
        child_role: &str,
    ) -> AppResult<bool> {
        let mut rules = self.inheritance_rules.write().await;
        let before = rules.len();
        rules.retain(|rule| !rule.same_edge(parent_role, child_role));
        Ok(rules.len() != before)
    }
}

#[async_trait]
impl DelegationRuleRepository for InMemoryAccessStore {
    async fn list_delegation_rules(&self) -> AppResult<Vec<DelegationRule>> {
        self.list_delegation_rules_impl().await
    }

    async fn find_delegation_rule(
        &self,
        from_role: &str,
        to_role: &str,
    ) -> AppResult<Option<DelegationRule>> {
        Ok(self
            .delegation_rules
            .read()
            .await
            .iter()
            .find(|rule| rule.same_edge(from_role, to_role))
            .cloned())
    }

    async fn add_delegation_rule(&self, rule: DelegationRule) -> AppResult<()> {
        self.add_delegation_rule_impl(rule).await
    }

    async fn remove_delegation_rule(&self, from_role: &str, to_role: &str) -> AppResult<bool> {
        let mut rules = self.delegation_rules.write().await;
        let before = rules.len();
        rules.retain(|rule| !rule.same_edge(from_role, to_role));
        Ok(rules.len() != before)
    }
}
