use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use retreat_access_core::UserId;
use retreat_access_domain::{InheritanceCondition, InheritanceRule, MembershipStatus};

use crate::CacheStore;
use crate::test_support::{FakeCache, FakeStore, permission};

use super::InheritanceEngine;

fn engine(store: &Arc<FakeStore>) -> InheritanceEngine {
    let cache = CacheStore::new(Arc::new(FakeCache::default()), 300);
    InheritanceEngine::new(store.clone(), store.clone(), store.clone(), cache)
}

fn edge(parent: &str, child: &str) -> retreat_access_core::AppResult<InheritanceRule> {
    InheritanceRule::new(parent, child, true, false, Vec::new())
}

#[tokio::test]
async fn expansion_follows_permission_edges_transitively() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("admin", &["retreat:manage"]).await;
    store.add_role("coordinator", &["schedule:edit"]).await;
    store.add_role("volunteer", &["shift:claim"]).await;
    store.add_inheritance(edge("admin", "coordinator")).await;
    store.add_inheritance(edge("coordinator", "volunteer")).await;

    let expanded = engine(&store).expand("admin", retreat).await;
    assert!(expanded.is_ok());
    assert_eq!(
        expanded.unwrap_or_default(),
        BTreeSet::from([
            permission("retreat:manage"),
            permission("schedule:edit"),
            permission("shift:claim"),
        ])
    );
}

#[tokio::test]
async fn cycles_terminate_with_union_of_the_cycle() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("a", &["a:x"]).await;
    store.add_role("b", &["b:x"]).await;
    store.add_inheritance(edge("a", "b")).await;
    store.add_inheritance(edge("b", "a")).await;

    let engine = engine(&store);
    let from_a = engine.expand("a", retreat).await;
    let from_b = engine.expand("b", retreat).await;
    assert!(from_a.is_ok() && from_b.is_ok());

    let expected = BTreeSet::from([permission("a:x"), permission("b:x")]);
    assert_eq!(from_a.unwrap_or_default(), expected);
    assert_eq!(from_b.unwrap_or_default(), expected);
}

#[tokio::test]
async fn delegation_only_edges_do_not_inherit_permissions() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("admin", &["retreat:manage"]).await;
    store.add_role("treasurer", &["payment:read"]).await;
    store
        .add_inheritance(InheritanceRule::new("admin", "treasurer", false, true, Vec::new()))
        .await;

    let engine = engine(&store);
    let expanded = engine.expand("admin", retreat).await;
    assert_eq!(
        expanded.unwrap_or_default(),
        BTreeSet::from([permission("retreat:manage")])
    );

    let delegation_roles = engine.delegation_roles("admin", retreat).await;
    assert_eq!(
        delegation_roles.unwrap_or_default(),
        vec!["admin".to_owned(), "treasurer".to_owned()]
    );
}

#[tokio::test]
async fn required_condition_gates_the_edge_until_a_member_holds_it() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("lead", &["team:lead"]).await;
    store.add_role("finance", &["payment:approve"]).await;
    store.add_role("auditor", &["audit:run"]).await;
    store
        .add_inheritance(InheritanceRule::new(
            "lead",
            "finance",
            true,
            false,
            vec![InheritanceCondition {
                permission: permission("audit:run"),
                required: true,
            }],
        ))
        .await;

    let expanded = engine(&store).expand("lead", retreat).await;
    assert_eq!(expanded.unwrap_or_default(), BTreeSet::from([permission("team:lead")]));

    store.add_member(UserId::new(), retreat, "auditor").await;

    // Fresh engine so the earlier expansion is not served from cache.
    let expanded = engine(&store).expand("lead", retreat).await;
    assert_eq!(
        expanded.unwrap_or_default(),
        BTreeSet::from([permission("team:lead"), permission("payment:approve")])
    );
}

#[tokio::test]
async fn informational_conditions_always_hold() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("lead", &["team:lead"]).await;
    store.add_role("finance", &["payment:approve"]).await;
    store
        .add_inheritance(InheritanceRule::new(
            "lead",
            "finance",
            true,
            false,
            vec![InheritanceCondition {
                permission: permission("audit:run"),
                required: false,
            }],
        ))
        .await;

    let expanded = engine(&store).expand("lead", retreat).await;
    assert!(expanded.unwrap_or_default().contains(&permission("payment:approve")));
}

#[tokio::test]
async fn unknown_role_expands_to_nothing() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;

    let expanded = engine(&store).expand("nobody", retreat).await;
    assert!(expanded.is_ok());
    assert!(expanded.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn condition_expiry_reports_the_earliest_satisfying_membership() {
    let store = Arc::new(FakeStore::default());
    let retreat = store.add_retreat(UserId::new()).await;
    store.add_role("lead", &["team:lead"]).await;
    store.add_role("finance", &["payment:approve"]).await;
    store.add_role("auditor", &["audit:run"]).await;
    store
        .add_inheritance(InheritanceRule::new(
            "lead",
            "finance",
            true,
            false,
            vec![InheritanceCondition {
                permission: permission("audit:run"),
                required: true,
            }],
        ))
        .await;
    let lapses_at = Utc::now() + Duration::minutes(10);
    store
        .add_membership(
            UserId::new(),
            retreat,
            "auditor",
            MembershipStatus::Active,
            Some(lapses_at),
        )
        .await;

    let engine = engine(&store);
    let inherited = engine.expand_detailed("lead", retreat).await;
    assert!(inherited.is_ok());
    let inherited = inherited.unwrap_or_default();
    assert!(inherited.permissions.contains(&permission("payment:approve")));
    assert_eq!(inherited.condition_expiry, Some(lapses_at));

    // Served from cache with the expiry intact.
    let cached = engine.expand_detailed("lead", retreat).await;
    assert_eq!(cached.unwrap_or_default().condition_expiry, Some(lapses_at));

    let unconditional = engine.expand_detailed("finance", retreat).await;
    assert_eq!(unconditional.unwrap_or_default().condition_expiry, None);
}
