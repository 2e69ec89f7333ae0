use std::sync::Arc;

use retreat_access_application::{AccessControlService, AccessPorts, CacheStore};
use retreat_access_infrastructure::{
    InMemoryAccessStore, InMemoryPermissionCache, PostgresAccessRepository,
    PostgresAuditRepository, PostgresDelegationRepository, PostgresOverrideRepository,
    PostgresPolicyRepository,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

pub fn postgres_ports(pool: PgPool) -> AccessPorts {
    let access_repository = Arc::new(PostgresAccessRepository::new(pool.clone()));
    let policy_repository = Arc::new(PostgresPolicyRepository::new(pool.clone()));

    AccessPorts {
        roles: access_repository.clone(),
        memberships: access_repository.clone(),
        retreats: access_repository,
        delegations: Arc::new(PostgresDelegationRepository::new(pool.clone())),
        overrides: Arc::new(PostgresOverrideRepository::new(pool.clone())),
        inheritance_rules: policy_repository.clone(),
        delegation_rules: policy_repository,
        audit: Arc::new(PostgresAuditRepository::new(pool)),
    }
}

pub fn in_memory_ports(store: Arc<InMemoryAccessStore>) -> AccessPorts {
    AccessPorts {
        roles: store.clone(),
        memberships: store.clone(),
        retreats: store.clone(),
        delegations: store.clone(),
        overrides: store.clone(),
        inheritance_rules: store.clone(),
        delegation_rules: store.clone(),
        audit: store,
    }
}

pub fn build_app_state(
    ports: AccessPorts,
    config: &ApiConfig,
    storage_backend: &'static str,
) -> AppState {
    let cache = CacheStore::new(
        Arc::new(InMemoryPermissionCache::new()),
        config.cache_ttl_seconds,
    );

    AppState {
        access_control: AccessControlService::new(ports, cache),
        trusted_proxies: Arc::new(config.trusted_proxies.clone()),
        storage_backend,
    }
}
