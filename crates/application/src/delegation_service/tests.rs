use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use retreat_access_core::{AppError, RetreatId, UserId};
use retreat_access_domain::{
    AuditAction, Delegation, DelegationId, DelegationRule, DelegationStatus, InheritanceRule,
};

use crate::CreateDelegationInput;
use crate::test_support::{Harness, actor, harness, permission};

struct Scenario {
    harness: Harness,
    retreat: RetreatId,
    admin: UserId,
    treasurer: UserId,
}

async fn scenario(requires_approval: bool) -> Scenario {
    let harness = harness();
    let creator = UserId::new();
    let admin = UserId::new();
    let treasurer = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;

    harness
        .store
        .add_role("admin", &["payment:read", "payment:export", "payment:delete"])
        .await;
    harness.store.add_role("treasurer", &["event:view"]).await;
    harness.store.add_member(admin, retreat, "admin").await;
    harness.store.add_member(treasurer, retreat, "treasurer").await;
    harness
        .store
        .add_delegation_policy(DelegationRule::new(
            "admin",
            "treasurer",
            [permission("payment:read"), permission("payment:export")],
            168,
            requires_approval,
        ))
        .await;

    Scenario {
        harness,
        retreat,
        admin,
        treasurer,
    }
}

fn input(scenario: &Scenario, permissions: &[&str], duration_hours: Option<u32>) -> CreateDelegationInput {
    CreateDelegationInput {
        to_user: scenario.treasurer,
        retreat_id: scenario.retreat,
        permissions: permissions.iter().map(|value| permission(value)).collect(),
        duration_hours,
    }
}

#[tokio::test]
async fn can_delegate_requires_every_permission_in_the_rule() {
    let scenario = scenario(false).await;
    let delegations = scenario.harness.service.delegation_service();

    let allowed = delegations
        .can_delegate(
            scenario.admin,
            scenario.treasurer,
            scenario.retreat,
            &[permission("payment:read")],
        )
        .await;
    assert!(allowed.is_ok());
    let allowed = allowed.unwrap_or_else(|_| unreachable!());
    assert!(allowed.can_delegate);
    assert!(!allowed.requires_approval);
    assert_eq!(allowed.max_duration_hours, 168);

    let denied = delegations
        .can_delegate(
            scenario.admin,
            scenario.treasurer,
            scenario.retreat,
            &[permission("payment:read"), permission("payment:delete")],
        )
        .await;
    assert!(denied.is_ok());
    assert!(!denied.unwrap_or_else(|_| unreachable!()).can_delegate);
}

#[tokio::test]
async fn can_delegate_is_false_without_a_retreat_role() {
    let scenario = scenario(false).await;
    let outsider = UserId::new();

    let check = scenario
        .harness
        .service
        .can_delegate_permissions(
            scenario.admin,
            outsider,
            scenario.retreat,
            &[permission("payment:read")],
        )
        .await;
    assert!(check.is_ok());
    let check = check.unwrap_or_else(|_| unreachable!());
    assert!(!check.can_delegate);
    assert_eq!(check.max_duration_hours, 0);
}

#[tokio::test]
async fn create_uses_rule_maximum_when_duration_is_absent() {
    let scenario = scenario(false).await;
    let before = Utc::now();

    let created = scenario
        .harness
        .service
        .create_permission_delegation(&actor(scenario.admin), input(&scenario, &["payment:read"], None))
        .await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());

    assert_eq!(created.status, DelegationStatus::Active);
    assert!(created.expires_at >= before + Duration::hours(168));
    assert!(created.expires_at <= Utc::now() + Duration::hours(168));
    assert_eq!(
        scenario.harness.store.audit_actions().await,
        vec![AuditAction::DelegationCreated]
    );
}

#[tokio::test]
async fn create_rejects_permissions_outside_the_rule() {
    let scenario = scenario(false).await;

    let result = scenario
        .harness
        .service
        .create_permission_delegation(
            &actor(scenario.admin),
            input(&scenario, &["payment:read", "payment:delete"], Some(24)),
        )
        .await;

    assert!(matches!(result, Err(AppError::PolicyViolation(message)) if message.contains("payment:delete")));
    assert!(
        scenario
            .harness
            .service
            .get_active_delegations(scenario.treasurer, Some(scenario.retreat))
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn create_rejects_invalid_requests() {
    let scenario = scenario(false).await;
    let service = &scenario.harness.service;
    let admin = actor(scenario.admin);

    let empty = service
        .create_permission_delegation(&admin, input(&scenario, &[], Some(24)))
        .await;
    assert!(matches!(empty, Err(AppError::Validation(_))));

    let mut to_self = input(&scenario, &["payment:read"], Some(24));
    to_self.to_user = scenario.admin;
    let to_self = service.create_permission_delegation(&admin, to_self).await;
    assert!(matches!(to_self, Err(AppError::Validation(_))));

    let too_long = service
        .create_permission_delegation(&admin, input(&scenario, &["payment:read"], Some(169)))
        .await;
    assert!(matches!(too_long, Err(AppError::PolicyViolation(_))));

    let zero = service
        .create_permission_delegation(&admin, input(&scenario, &["payment:read"], Some(0)))
        .await;
    assert!(matches!(zero, Err(AppError::PolicyViolation(_))));

    let reversed = service
        .create_permission_delegation(
            &actor(scenario.treasurer),
            CreateDelegationInput {
                to_user: scenario.admin,
                retreat_id: scenario.retreat,
                permissions: vec![permission("event:view")],
                duration_hours: Some(1),
            },
        )
        .await;
    assert!(matches!(reversed, Err(AppError::PolicyViolation(_))));
}

#[tokio::test]
async fn rules_requiring_approval_are_rejected() {
    let scenario = scenario(true).await;

    let result = scenario
        .harness
        .service
        .create_permission_delegation(&actor(scenario.admin), input(&scenario, &["payment:read"], Some(4)))
        .await;

    assert!(matches!(result, Err(AppError::PolicyViolation(message)) if message.contains("approval")));
}

#[tokio::test]
async fn delegation_rights_follow_inherit_delegation_edges() {
    let scenario = scenario(false).await;
    let coordinator = UserId::new();
    scenario.harness.store.add_role("coordinator", &[]).await;
    scenario
        .harness
        .store
        .add_member(coordinator, scenario.retreat, "coordinator")
        .await;
    scenario
        .harness
        .store
        .add_inheritance(InheritanceRule::new("coordinator", "admin", false, true, Vec::new()))
        .await;

    let check = scenario
        .harness
        .service
        .can_delegate_permissions(
            coordinator,
            scenario.treasurer,
            scenario.retreat,
            &[permission("payment:export")],
        )
        .await;
    assert!(check.is_ok());
    assert!(check.unwrap_or_else(|_| unreachable!()).can_delegate);
}

#[tokio::test]
async fn revoke_is_limited_to_parties_and_managers() {
    let scenario = scenario(false).await;
    let service = &scenario.harness.service;

    let created = service
        .create_permission_delegation(&actor(scenario.admin), input(&scenario, &["payment:read"], Some(2)))
        .await;
    assert!(created.is_ok());
    let created = created.unwrap_or_else(|_| unreachable!());

    let stranger = service
        .revoke_delegation(&actor(UserId::new()), created.delegation_id)
        .await;
    assert!(matches!(stranger, Err(AppError::Forbidden(_))));

    let revoked = service
        .revoke_delegation(&actor(scenario.treasurer), created.delegation_id)
        .await;
    assert!(matches!(revoked, Ok(true)));

    let again = service
        .revoke_delegation(&actor(scenario.admin), created.delegation_id)
        .await;
    assert!(matches!(again, Ok(false)));

    let missing = service
        .revoke_delegation(&actor(scenario.admin), DelegationId::new())
        .await;
    assert!(matches!(missing, Ok(false)));

    let stored = scenario.harness.store.delegation(created.delegation_id).await;
    assert!(stored.is_some_and(|delegation| {
        delegation.status == DelegationStatus::Revoked
            && delegation.revoked_by == Some(scenario.treasurer)
    }));
}

#[tokio::test]
async fn cleanup_marks_lapsed_delegations_expired() {
    let scenario = scenario(false).await;
    let now = Utc::now();
    let lapsed = Delegation {
        delegation_id: DelegationId::new(),
        from_user: scenario.admin,
        to_user: scenario.treasurer,
        retreat_id: scenario.retreat,
        permissions: BTreeSet::from([permission("payment:read")]),
        status: DelegationStatus::Active,
        created_at: now - Duration::hours(3),
        expires_at: now - Duration::hours(1),
        revoked_at: None,
        revoked_by: None,
    };
    let lapsed_id = lapsed.delegation_id;
    scenario.harness.store.insert_raw_delegation(lapsed).await;

    let active = scenario
        .harness
        .service
        .get_active_delegations(scenario.treasurer, None)
        .await;
    assert!(active.unwrap_or_default().is_empty());

    let delegations = scenario.harness.service.delegation_service();
    assert!(matches!(delegations.cleanup_expired().await, Ok(1)));
    assert!(matches!(delegations.cleanup_expired().await, Ok(0)));

    let stored = scenario.harness.store.delegation(lapsed_id).await;
    assert!(stored.is_some_and(|delegation| delegation.status == DelegationStatus::Expired));
}

#[tokio::test]
async fn every_retreat_role_of_the_delegate_is_considered() {
    let scenario = scenario(false).await;
    scenario.harness.store.add_role("assistant", &["event:view"]).await;
    scenario
        .harness
        .store
        .add_member(scenario.treasurer, scenario.retreat, "assistant")
        .await;
    let service = &scenario.harness.service;

    assert!(matches!(
        service
            .has_retreat_role(scenario.treasurer, scenario.retreat, "treasurer")
            .await,
        Ok(true)
    ));

    let check = service
        .can_delegate_permissions(
            scenario.admin,
            scenario.treasurer,
            scenario.retreat,
            &[permission("payment:read")],
        )
        .await;
    assert!(matches!(check, Ok(ref check) if check.can_delegate && check.max_duration_hours == 168));

    let created = service
        .create_permission_delegation(
            &actor(scenario.admin),
            input(&scenario, &["payment:read"], Some(12)),
        )
        .await;
    assert!(created.is_ok());
}

#[tokio::test]
async fn every_retreat_role_of_the_delegator_is_considered() {
    let scenario = scenario(false).await;
    let accountant = UserId::new();
    scenario.harness.store.add_role("accountant", &["event:edit"]).await;
    scenario
        .harness
        .store
        .add_member(accountant, scenario.retreat, "accountant")
        .await;
    scenario
        .harness
        .store
        .add_member(accountant, scenario.retreat, "admin")
        .await;

    let check = scenario
        .harness
        .service
        .can_delegate_permissions(
            accountant,
            scenario.treasurer,
            scenario.retreat,
            &[permission("payment:export")],
        )
        .await;
    assert!(matches!(check, Ok(ref check) if check.can_delegate));
}
