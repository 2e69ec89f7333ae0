mod audit;
mod cache;
mod delegations;
mod overrides;
mod policy;
mod repositories;

pub use audit::{AuditEvent, AuditRepository};
pub use cache::{CacheNamespace, PermissionCache};
pub use delegations::DelegationRepository;
pub use overrides::OverrideRepository;
pub use policy::{DelegationRuleRepository, InheritanceRuleRepository};
pub use repositories::{MembershipRepository, RetreatRecord, RetreatRepository, RoleRepository};
