use std::sync::Arc;

use retreat_access_application::{
    DelegationRuleRepository, InheritanceRuleRepository, RoleRepository,
};
use retreat_access_core::{AppResult, RetreatId, UserId};
use retreat_access_domain::{
    DelegationRule, InheritanceRule, PermissionKey, SUPERADMIN_ROLE,
};
use retreat_access_infrastructure::InMemoryAccessStore;
use tracing::info;

const DEV_SEED_RETREAT_NAME: &str = "Spring Silent Retreat";

const DEV_SEED_ROLES: &[(&str, &str, &[&str])] = &[
    (
        "retreat_admin",
        "Runs a retreat end to end",
        &["retreat:manage", "member:invite", "payment:manage"],
    ),
    (
        "coordinator",
        "Plans sessions and staffing",
        &["event:update", "shift:assign"],
    ),
    ("volunteer", "Helps on site", &["event:read", "shift:claim"]),
];

/// Seeds the in-memory store with a superadmin owner, a retreat owned by
/// them and a small role hierarchy.
pub async fn run(store: &Arc<InMemoryAccessStore>, owner: UserId) -> AppResult<RetreatId> {
    let superadmin = store
        .create_role(
            SUPERADMIN_ROLE,
            "Administers every retreat",
            [PermissionKey::system_admin()],
        )
        .await?;
    store
        .assign_global_role(owner, superadmin.role_id())
        .await?;

    for (name, description, permissions) in DEV_SEED_ROLES {
        let permissions = permissions
            .iter()
            .map(|value| PermissionKey::parse(value))
            .collect::<AppResult<Vec<_>>>()?;
        store.create_role(name, description, permissions).await?;
    }

    let retreat = store.create_retreat(DEV_SEED_RETREAT_NAME, owner).await;

    store
        .add_inheritance_rule(InheritanceRule::new(
            "retreat_admin",
            "coordinator",
            true,
            true,
            Vec::new(),
        )?)
        .await?;
    store
        .add_inheritance_rule(InheritanceRule::new(
            "coordinator",
            "volunteer",
            true,
            false,
            Vec::new(),
        )?)
        .await?;
    store
        .add_delegation_rule(DelegationRule::new(
            "coordinator",
            "volunteer",
            [PermissionKey::parse("shift:assign")?],
            48,
            false,
        )?)
        .await?;

    info!(
        owner = %owner,
        retreat_id = %retreat.retreat_id,
        "seeded in-memory store for development"
    );

    Ok(retreat.retreat_id)
}
