//! Domain entities and invariants for retreat access control.

#![forbid(unsafe_code)]

mod delegation;
mod membership;
mod permission_override;
mod policy;
mod role;
mod security;

pub use delegation::{Delegation, DelegationId, DelegationStatus};
pub use membership::{MembershipStatus, RetreatMembership};
pub use permission_override::{
    OverrideEntry, PermissionOverride, apply_override_denials, apply_override_entries,
};
pub use policy::{DelegationRule, InheritanceCondition, InheritanceRule};
pub use role::{Role, RoleId};
pub use security::{
    ADMIN_OPERATION, AuditAction, PermissionKey, SUPERADMIN_ROLE, SYSTEM_RESOURCE,
};
