use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult, AuditContext, RetreatId, UserId};
use retreat_access_domain::{
    AuditAction, Delegation, DelegationId, DelegationRule, DelegationStatus, InheritanceRule,
    MembershipStatus, PermissionKey, PermissionOverride, RetreatMembership, Role, RoleId,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    AccessControlService, AccessPorts, AuditEvent, AuditRepository, CacheNamespace, CacheStore,
    DelegationRepository, DelegationRuleRepository, InheritanceRuleRepository,
    MembershipRepository, OverrideRepository, PermissionCache, RetreatRecord, RetreatRepository,
    RoleRepository,
};

pub(crate) fn permission(value: &str) -> PermissionKey {
    PermissionKey::parse(value).unwrap_or_else(|_| PermissionKey::system_admin())
}

pub(crate) fn actor(user_id: UserId) -> AuditContext {
    AuditContext::for_actor(user_id)
}

#[derive(Default)]
pub(crate) struct FakeCache {
    entries: Mutex<HashMap<(CacheNamespace, String), Value>>,
    fail_reads: AtomicBool,
    fail_invalidations: AtomicBool,
}

impl FakeCache {
    pub(crate) fn fail_reads(&self, value: bool) {
        self.fail_reads.store(value, Ordering::SeqCst);
    }

    pub(crate) fn fail_invalidations(&self, value: bool) {
        self.fail_invalidations.store(value, Ordering::SeqCst);
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PermissionCache for FakeCache {
    async fn get(&self, namespace: CacheNamespace, key: &str) -> AppResult<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache read failed".to_owned()));
        }

        Ok(self
            .entries
            .lock()
            .await
            .get(&(namespace, key.to_owned()))
            .cloned())
    }

    async fn set(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: Value,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        if ttl_seconds > 0 {
            self.entries
                .lock()
                .await
                .insert((namespace, key.to_owned()), value);
        }
        Ok(())
    }

    async fn invalidate_prefix(
        &self,
        namespace: CacheNamespace,
        key_prefix: &str,
    ) -> AppResult<u64> {
        if self.fail_invalidations.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache invalidation failed".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|(entry_namespace, key), _| {
            *entry_namespace != namespace || !key.starts_with(key_prefix)
        });
        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    roles: Mutex<Vec<Role>>,
    role_permissions: Mutex<HashMap<RoleId, Vec<PermissionKey>>>,
    global_roles: Mutex<Vec<(UserId, RoleId)>>,
    memberships: Mutex<Vec<RetreatMembership>>,
    retreats: Mutex<Vec<RetreatRecord>>,
    delegations: Mutex<Vec<Delegation>>,
    overrides: Mutex<Vec<PermissionOverride>>,
    inheritance_rules: Mutex<Vec<InheritanceRule>>,
    delegation_rules: Mutex<Vec<DelegationRule>>,
    audit_events: Mutex<Vec<AuditEvent>>,
    fail_audit: AtomicBool,
    membership_reads: AtomicUsize,
}

impl FakeStore {
    pub(crate) async fn add_role(&self, name: &str, permissions: &[&str]) -> RoleId {
        let role_id = RoleId::new();
        let role = Role::new(role_id, name, "");
        assert!(role.is_ok());
        if let Ok(role) = role {
            self.roles.lock().await.push(role);
        }
        self.role_permissions.lock().await.insert(
            role_id,
            permissions.iter().map(|value| permission(value)).collect(),
        );
        role_id
    }

    pub(crate) async fn add_retreat(&self, created_by: UserId) -> RetreatId {
        let retreat_id = RetreatId::new();
        self.retreats.lock().await.push(RetreatRecord {
            retreat_id,
            name: "Spring Retreat".to_owned(),
            created_by,
        });
        retreat_id
    }

    pub(crate) async fn add_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_name: &str,
        status: MembershipStatus,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let role_id = self.role_id(role_name).await;
        self.memberships.lock().await.push(RetreatMembership {
            user_id,
            retreat_id,
            role_id,
            status,
            invited_by: None,
            invited_at: Utc::now(),
            expires_at,
        });
    }

    pub(crate) async fn add_member(&self, user_id: UserId, retreat_id: RetreatId, role_name: &str) {
        self.add_membership(user_id, retreat_id, role_name, MembershipStatus::Active, None)
            .await;
    }

    pub(crate) async fn grant_global_role(&self, user_id: UserId, role_name: &str) {
        let role_id = self.role_id(role_name).await;
        self.global_roles.lock().await.push((user_id, role_id));
    }

    pub(crate) async fn add_inheritance(&self, rule: AppResult<InheritanceRule>) {
        assert!(rule.is_ok());
        if let Ok(rule) = rule {
            self.inheritance_rules.lock().await.push(rule);
        }
    }

    pub(crate) async fn add_delegation_policy(&self, rule: AppResult<DelegationRule>) {
        assert!(rule.is_ok());
        if let Ok(rule) = rule {
            self.delegation_rules.lock().await.push(rule);
        }
    }

    pub(crate) async fn insert_raw_delegation(&self, delegation: Delegation) {
        self.delegations.lock().await.push(delegation);
    }

    pub(crate) async fn delegation(&self, delegation_id: DelegationId) -> Option<Delegation> {
        self.delegations
            .lock()
            .await
            .iter()
            .find(|delegation| delegation.delegation_id == delegation_id)
            .cloned()
    }

    pub(crate) async fn audit_actions(&self) -> Vec<AuditAction> {
        self.audit_events
            .lock()
            .await
            .iter()
            .map(|event| event.action)
            .collect()
    }

    pub(crate) async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.lock().await.clone()
    }

    pub(crate) fn fail_audit(&self, value: bool) {
        self.fail_audit.store(value, Ordering::SeqCst);
    }

    pub(crate) fn membership_reads(&self) -> usize {
        self.membership_reads.load(Ordering::SeqCst)
    }

    pub(crate) async fn membership_status(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> Vec<MembershipStatus> {
        self.memberships
            .lock()
            .await
            .iter()
            .filter(|membership| membership.user_id == user_id && membership.retreat_id == retreat_id)
            .map(|membership| membership.status)
            .collect()
    }

    pub(crate) async fn delete_role(&self, role_name: &str) {
        self.roles.lock().await.retain(|role| role.name() != role_name);
    }

    async fn role_id(&self, role_name: &str) -> RoleId {
        self.roles
            .lock()
            .await
            .iter()
            .find(|role| role.name() == role_name)
            .map(Role::role_id)
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoleRepository for FakeStore {
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.name() == name)
            .cloned())
    }

    async fn list_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .filter(|role| role_ids.contains(&role.role_id()))
            .cloned()
            .collect())
    }

    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<PermissionKey>> {
        let grants = self.role_permissions.lock().await;
        let mut permissions: Vec<PermissionKey> = role_ids
            .iter()
            .filter_map(|role_id| grants.get(role_id))
            .flatten()
            .cloned()
            .collect();
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }

    async fn list_global_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        let assignments = self.global_roles.lock().await;
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .filter(|role| assignments.contains(&(user_id, role.role_id())))
            .cloned()
            .collect())
    }

    async fn assign_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        let mut assignments = self.global_roles.lock().await;
        if assignments.contains(&(user_id, role_id)) {
            return Ok(false);
        }
        assignments.push((user_id, role_id));
        Ok(true)
    }

    async fn remove_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        let mut assignments = self.global_roles.lock().await;
        let before = assignments.len();
        assignments.retain(|assignment| *assignment != (user_id, role_id));
        Ok(assignments.len() != before)
    }
}

#[async_trait]
impl MembershipRepository for FakeStore {
    async fn list_live_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.membership_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .filter(|membership| membership.user_id == user_id && membership.status.is_live())
            .cloned()
            .collect())
    }

    async fn list_active_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .filter(|membership| {
                membership.retreat_id == retreat_id && membership.status == MembershipStatus::Active
            })
            .cloned()
            .collect())
    }

    async fn list_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .filter(|membership| membership.retreat_id == retreat_id)
            .cloned()
            .collect())
    }

    async fn find_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
    ) -> AppResult<Option<RetreatMembership>> {
        Ok(self
            .memberships
            .lock()
            .await
            .iter()
            .find(|membership| {
                membership.user_id == user_id
                    && membership.retreat_id == retreat_id
                    && membership.role_id == role_id
            })
            .cloned())
    }

    async fn upsert_membership(&self, membership: RetreatMembership) -> AppResult<()> {
        let mut memberships = self.memberships.lock().await;
        memberships.retain(|existing| {
            !(existing.user_id == membership.user_id
                && existing.retreat_id == membership.retreat_id
                && existing.role_id == membership.role_id)
        });
        memberships.push(membership);
        Ok(())
    }

    async fn transition_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool> {
        let mut memberships = self.memberships.lock().await;
        let Some(membership) = memberships.iter_mut().find(|membership| {
            membership.user_id == user_id
                && membership.retreat_id == retreat_id
                && membership.role_id == role_id
                && from.contains(&membership.status)
        }) else {
            return Ok(false);
        };
        membership.status = to;
        Ok(true)
    }

    async fn expire_memberships(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for membership in self.memberships.lock().await.iter_mut() {
            if membership.status.is_live()
                && membership.expires_at.is_some_and(|expires_at| expires_at <= now)
            {
                membership.status = MembershipStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl RetreatRepository for FakeStore {
    async fn find_retreat(&self, retreat_id: RetreatId) -> AppResult<Option<RetreatRecord>> {
        Ok(self
            .retreats
            .lock()
            .await
            .iter()
            .find(|retreat| retreat.retreat_id == retreat_id)
            .cloned())
    }
}

#[async_trait]
impl DelegationRepository for FakeStore {
    async fn insert_delegation(&self, delegation: Delegation) -> AppResult<()> {
        self.delegations.lock().await.push(delegation);
        Ok(())
    }

    async fn find_delegation(&self, delegation_id: DelegationId) -> AppResult<Option<Delegation>> {
        Ok(self.delegation(delegation_id).await)
    }

    async fn list_active_delegations_for_user(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Delegation>> {
        Ok(self
            .delegations
            .lock()
            .await
            .iter()
            .filter(|delegation| {
                delegation.involves(user_id)
                    && delegation.is_active_at(now)
                    && retreat_id.is_none_or(|retreat_id| delegation.retreat_id == retreat_id)
            })
            .cloned()
            .collect())
    }

    async fn list_delegations_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>> {
        Ok(self
            .delegations
            .lock()
            .await
            .iter()
            .filter(|delegation| delegation.retreat_id == retreat_id)
            .cloned()
            .collect())
    }

    async fn revoke_delegation(
        &self,
        delegation_id: DelegationId,
        revoked_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut delegations = self.delegations.lock().await;
        let Some(delegation) = delegations.iter_mut().find(|delegation| {
            delegation.delegation_id == delegation_id
                && delegation.status == DelegationStatus::Active
        }) else {
            return Ok(false);
        };
        delegation.status = DelegationStatus::Revoked;
        delegation.revoked_at = Some(now);
        delegation.revoked_by = Some(revoked_by);
        Ok(true)
    }

    async fn expire_delegations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for delegation in self.delegations.lock().await.iter_mut() {
            if delegation.status == DelegationStatus::Active && delegation.expires_at <= now {
                delegation.status = DelegationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl OverrideRepository for FakeStore {
    async fn find_override(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Option<PermissionOverride>> {
        Ok(self
            .overrides
            .lock()
            .await
            .iter()
            .find(|record| record.user_id == user_id && record.retreat_id == retreat_id)
            .cloned())
    }

    async fn save_override(&self, record: PermissionOverride) -> AppResult<()> {
        let mut overrides = self.overrides.lock().await;
        overrides.retain(|existing| {
            !(existing.user_id == record.user_id && existing.retreat_id == record.retreat_id)
        });
        overrides.push(record);
        Ok(())
    }

    async fn delete_override(&self, user_id: UserId, retreat_id: RetreatId) -> AppResult<bool> {
        let mut overrides = self.overrides.lock().await;
        let before = overrides.len();
        overrides.retain(|record| !(record.user_id == user_id && record.retreat_id == retreat_id));
        Ok(overrides.len() != before)
    }
}

#[async_trait]
impl InheritanceRuleRepository for FakeStore {
    async fn list_inheritance_rules(&self) -> AppResult<Vec<InheritanceRule>> {
        Ok(self.inheritance_rules.lock().await.clone())
    }

    async fn list_rules_for_parent(&self, parent_role: &str) -> AppResult<Vec<InheritanceRule>> {
        Ok(self
            .inheritance_rules
            .lock()
            .await
            .iter()
            .filter(|rule| rule.parent_role() == parent_role)
            .cloned()
            .collect())
    }

    async fn add_inheritance_rule(&self, rule: InheritanceRule) -> AppResult<()> {
        let mut rules = self.inheritance_rules.lock().await;
        if rules
            .iter()
            .any(|existing| existing.same_edge(rule.parent_role(), rule.child_role()))
        {
            return Err(AppError::Conflict("inheritance rule already exists".to_owned()));
        }
        rules.push(rule);
        Ok(())
    }

    async fn remove_inheritance_rule(
        &self,
        parent_role: &str,
        child_role: &str,
    ) -> AppResult<bool> {
        let mut rules = self.inheritance_rules.lock().await;
        let before = rules.len();
        rules.retain(|rule| !rule.same_edge(parent_role, child_role));
        Ok(rules.len() != before)
    }
}

#[async_trait]
impl DelegationRuleRepository for FakeStore {
    async fn list_delegation_rules(&self) -> AppResult<Vec<DelegationRule>> {
        Ok(self.delegation_rules.lock().await.clone())
    }

    async fn find_delegation_rule(
        &self,
        from_role: &str,
        to_role: &str,
    ) -> AppResult<Option<DelegationRule>> {
        Ok(self
            .delegation_rules
            .lock()
            .await
            .iter()
            .find(|rule| rule.same_edge(from_role, to_role))
            .cloned())
    }

    async fn add_delegation_rule(&self, rule: DelegationRule) -> AppResult<()> {
        let mut rules = self.delegation_rules.lock().await;
        if rules
            .iter()
            .any(|existing| existing.same_edge(rule.from_role(), rule.to_role()))
        {
            return Err(AppError::Conflict("delegation rule already exists".to_owned()));
        }
        rules.push(rule);
        Ok(())
    }

    async fn remove_delegation_rule(&self, from_role: &str, to_role: &str) -> AppResult<bool> {
        let mut rules = self.delegation_rules.lock().await;
        let before = rules.len();
        rules.retain(|rule| !rule.same_edge(from_role, to_role));
        Ok(rules.len() != before)
    }
}

#[async_trait]
impl AuditRepository for FakeStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit sink unavailable".to_owned()));
        }
        self.audit_events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) fn ports(store: &Arc<FakeStore>) -> AccessPorts {
    AccessPorts {
        roles: store.clone(),
        memberships: store.clone(),
        retreats: store.clone(),
        delegations: store.clone(),
        overrides: store.clone(),
        inheritance_rules: store.clone(),
        delegation_rules: store.clone(),
        audit: store.clone(),
    }
}

pub(crate) struct Harness {
    pub(crate) store: Arc<FakeStore>,
    pub(crate) cache: Arc<FakeCache>,
    pub(crate) service: AccessControlService,
}

pub(crate) fn harness() -> Harness {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(FakeCache::default());
    let service = AccessControlService::new(ports(&store), CacheStore::new(cache.clone(), 300));
    Harness {
        store,
        cache,
        service,
    }
}
