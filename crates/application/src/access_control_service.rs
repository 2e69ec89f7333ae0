use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult, AuditContext, RetreatId, UserId};
use retreat_access_domain::{
    AuditAction, MembershipStatus, PermissionKey, RetreatMembership, SUPERADMIN_ROLE,
};
use tracing::info;

use crate::audit_trail::AuditTrail;
use crate::cache_store::keys;
use crate::{
    AuditEvent, AuditRepository, CacheNamespace, CacheStats, CacheStore, DelegationRepository,
    DelegationRuleRepository, DelegationService, InheritanceEngine, InheritanceRuleRepository,
    MembershipRepository, OverrideRepository, OverrideService, PolicyAdminService,
    RetreatAuthority, RetreatRepository, RolePermissionResolver, RoleRepository,
};

mod checks;
mod global_roles;
mod grants;
mod memberships;


/// Persistence ports consumed by the access control services.
#[derive(Clone)]
pub struct AccessPorts {
    /// Roles, role grants and global role assignments.
    pub roles: Arc<dyn RoleRepository>,
    /// Retreat memberships.
    pub memberships: Arc<dyn MembershipRepository>,
    /// Retreat ownership lookups.
    pub retreats: Arc<dyn RetreatRepository>,
    /// Runtime delegations.
    pub delegations: Arc<dyn DelegationRepository>,
    /// Per-user overrides.
    pub overrides: Arc<dyn OverrideRepository>,
    /// Role inheritance graph.
    pub inheritance_rules: Arc<dyn InheritanceRuleRepository>,
    /// Delegation policy.
    pub delegation_rules: Arc<dyn DelegationRuleRepository>,
    /// Append-only audit sink.
    pub audit: Arc<dyn AuditRepository>,
}

/// Retreat member projection for administrative listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetreatMember {
    /// Underlying membership row.
    pub membership: RetreatMembership,
    /// Resolved role name.
    pub role_name: String,
}

/// Single entry point combining every permission source for a retreat.
#[derive(Clone)]
pub struct AccessControlService {
    resolver: RolePermissionResolver,
    inheritance: InheritanceEngine,
    authority: RetreatAuthority,
    delegations: DelegationService,
    overrides: OverrideService,
    policy: PolicyAdminService,
    roles: Arc<dyn RoleRepository>,
    memberships: Arc<dyn MembershipRepository>,
    retreats: Arc<dyn RetreatRepository>,
    cache: CacheStore,
    audit: AuditTrail,
}

impl AccessControlService {
    /// Wires the resolver, engines and layers over one shared cache store.
    #[must_use]
    pub fn new(ports: AccessPorts, cache: CacheStore) -> Self {
        let resolver =
            RolePermissionResolver::new(ports.roles.clone(), ports.memberships.clone(), cache.clone());
        let inheritance = InheritanceEngine::new(
            ports.roles.clone(),
            ports.memberships.clone(),
            ports.inheritance_rules.clone(),
            cache.clone(),
        );
        let authority = RetreatAuthority::new(resolver.clone(), ports.retreats.clone(), cache.clone());
        let audit = AuditTrail::new(ports.audit);

        let delegations = DelegationService::new(
            resolver.clone(),
            inheritance.clone(),
            authority.clone(),
            ports.delegations,
            ports.delegation_rules.clone(),
            cache.clone(),
            audit.clone(),
        );
        let overrides = OverrideService::new(
            ports.overrides,
            authority.clone(),
            cache.clone(),
            audit.clone(),
        );
        let policy = PolicyAdminService::new(
            authority.clone(),
            ports.inheritance_rules,
            ports.delegation_rules,
            cache.clone(),
            audit.clone(),
        );

        Self {
            resolver,
            inheritance,
            authority,
            delegations,
            overrides,
            policy,
            roles: ports.roles,
            memberships: ports.memberships,
            retreats: ports.retreats,
            cache,
            audit,
        }
    }

    /// Returns the delegation engine.
    #[must_use]
    pub fn delegation_service(&self) -> &DelegationService {
        &self.delegations
    }

    /// Returns the override layer.
    #[must_use]
    pub fn override_service(&self) -> &OverrideService {
        &self.overrides
    }

    /// Returns the policy administration service.
    #[must_use]
    pub fn policy_admin_service(&self) -> &PolicyAdminService {
        &self.policy
    }

    /// Returns cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Returns cache counters and the default ttl to a system administrator.
    pub async fn inspect_cache(&self, actor: &AuditContext) -> AppResult<(CacheStats, u64)> {
        self.authority.require_system_admin(actor.actor()).await?;
        Ok((self.cache.stats(), self.cache.ttl_seconds()))
    }

    /// Runs both scheduled cleanups. Returns (delegations, memberships) expired.
    pub async fn run_cleanup(&self) -> AppResult<(u64, u64)> {
        let delegations = self.delegations.cleanup_expired().await?;
        let memberships = self.expire_memberships().await?;
        Ok((delegations, memberships))
    }
}
