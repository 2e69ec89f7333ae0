//! Application services and ports.

#![forbid(unsafe_code)]

mod access_control_service;
mod access_ports;
mod audit_trail;
mod cache_store;
mod delegation_service;
mod inheritance_engine;
mod override_service;
mod policy_admin_service;
mod retreat_authority;
mod role_permission_resolver;

#[cfg(test)]
mod test_support;

pub use access_control_service::{AccessControlService, AccessPorts, RetreatMember};
pub use access_ports::{
    AuditEvent, AuditRepository, CacheNamespace, DelegationRepository, DelegationRuleRepository,
    InheritanceRuleRepository, MembershipRepository, OverrideRepository, PermissionCache,
    RetreatRecord, RetreatRepository, RoleRepository,
};
pub use cache_store::{CacheGeneration, CacheStats, CacheStore, DEFAULT_CACHE_TTL_SECONDS};
pub use delegation_service::{
    CreateDelegationInput, DelegatedPermissions, DelegationCheck, DelegationService,
};
pub use inheritance_engine::{InheritanceEngine, InheritedPermissions};
pub use override_service::{AppliedOverrides, OverrideService};
pub use policy_admin_service::PolicyAdminService;
pub use retreat_authority::RetreatAuthority;
pub use role_permission_resolver::{ResolvedAccess, RetreatRoleSummary, RolePermissionResolver};
