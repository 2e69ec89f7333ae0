//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_access_store;
mod in_memory_permission_cache;
mod postgres_access_repository;
mod postgres_audit_repository;
mod postgres_delegation_repository;
mod postgres_override_repository;
mod postgres_policy_repository;

pub use in_memory_access_store::InMemoryAccessStore;
pub use in_memory_permission_cache::InMemoryPermissionCache;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_delegation_repository::PostgresDelegationRepository;
pub use postgres_override_repository::PostgresOverrideRepository;
pub use postgres_policy_repository::PostgresPolicyRepository;
