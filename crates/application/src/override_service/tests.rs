use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use retreat_access_core::{AppError, UserId};
use retreat_access_domain::{AuditAction, OverrideEntry};

use crate::test_support::{actor, harness, permission};

fn entry(value: &str, granted: bool) -> OverrideEntry {
    OverrideEntry {
        permission: permission(value),
        granted,
        expires_at: None,
    }
}

#[tokio::test]
async fn set_requires_existing_retreat_access() {
    let harness = harness();
    let creator = UserId::new();
    let outsider = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;

    let result = harness
        .service
        .set_permission_override(
            &actor(creator),
            outsider,
            retreat,
            vec![entry("event:view", true)],
            "first look",
        )
        .await;

    assert!(matches!(result, Err(AppError::PolicyViolation(_))));
    assert!(
        harness
            .service
            .get_permission_overrides(outsider, retreat)
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn only_managers_may_set_overrides() {
    let harness = harness();
    let creator = UserId::new();
    let member = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;
    harness.store.add_role("volunteer", &["shift:claim"]).await;
    harness.store.add_member(member, retreat, "volunteer").await;

    let result = harness
        .service
        .set_permission_override(
            &actor(member),
            member,
            retreat,
            vec![entry("shift:manage", true)],
            "self promotion",
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn entries_are_returned_in_stored_order() {
    let harness = harness();
    let creator = UserId::new();
    let member = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;
    harness.store.add_role("volunteer", &["shift:claim"]).await;
    harness.store.add_member(member, retreat, "volunteer").await;

    let entries = vec![entry("x:y", true), entry("x:y", false), entry("a:b", true)];
    let result = harness
        .service
        .set_permission_override(&actor(creator), member, retreat, entries.clone(), "ordering")
        .await;
    assert!(result.is_ok());

    let stored = harness.service.get_permission_overrides(member, retreat).await;
    assert_eq!(stored.unwrap_or_default(), entries);
    assert_eq!(
        harness.store.audit_actions().await,
        vec![AuditAction::PermissionOverridesSet]
    );
}

#[tokio::test]
async fn apply_honours_order_and_expiry() {
    let harness = harness();
    let creator = UserId::new();
    let member = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;
    harness.store.add_role("volunteer", &["shift:claim"]).await;
    harness.store.add_member(member, retreat, "volunteer").await;

    let entries = vec![
        entry("x:y", true),
        entry("x:y", false),
        OverrideEntry {
            permission: permission("shift:claim"),
            granted: false,
            expires_at: Some(Utc::now() - Duration::minutes(1)),
        },
    ];
    let result = harness
        .service
        .set_permission_override(&actor(creator), member, retreat, entries, "mixed")
        .await;
    assert!(result.is_ok());

    let applied = harness
        .service
        .override_service()
        .apply(BTreeSet::from([permission("shift:claim")]), member, retreat)
        .await;
    assert_eq!(
        applied.unwrap_or_default(),
        BTreeSet::from([permission("shift:claim")])
    );
}

#[tokio::test]
async fn empty_set_clears_and_clear_reports_existence() {
    let harness = harness();
    let creator = UserId::new();
    let member = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;
    harness.store.add_role("volunteer", &["shift:claim"]).await;
    harness.store.add_member(member, retreat, "volunteer").await;
    let manager = actor(creator);

    let result = harness
        .service
        .set_permission_override(&manager, member, retreat, vec![entry("x:y", true)], "temp")
        .await;
    assert!(result.is_ok());

    let result = harness
        .service
        .set_permission_override(&manager, member, retreat, Vec::new(), "")
        .await;
    assert!(result.is_ok());
    assert!(
        harness
            .service
            .get_permission_overrides(member, retreat)
            .await
            .unwrap_or_default()
            .is_empty()
    );

    let cleared = harness
        .service
        .clear_permission_overrides(&manager, member, retreat)
        .await;
    assert!(matches!(cleared, Ok(false)));
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_mutation() {
    let harness = harness();
    let creator = UserId::new();
    let member = UserId::new();
    let retreat = harness.store.add_retreat(creator).await;
    harness.store.add_role("volunteer", &["shift:claim"]).await;
    harness.store.add_member(member, retreat, "volunteer").await;
    harness.store.fail_audit(true);

    let result = harness
        .service
        .set_permission_override(&actor(creator), member, retreat, vec![entry("x:y", true)], "audit down")
        .await;

    assert!(result.is_ok());
    assert!(harness.store.audit_events().await.is_empty());
}
