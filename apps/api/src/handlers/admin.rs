use super::*;

use retreat_access_domain::{DelegationRule, InheritanceRule};

pub async fn list_inheritance_rules_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
) -> ApiResult<Json<Vec<InheritanceRulePayload>>> {
    let rules = state
        .access_control
        .policy_admin_service()
        .list_inheritance_rules(&actor)
        .await?
        .into_iter()
        .map(InheritanceRulePayload::from)
        .collect();

    Ok(Json(rules))
}

pub async fn add_inheritance_rule_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<InheritanceRulePayload>,
) -> ApiResult<StatusCode> {
    let rule = InheritanceRule::try_from(payload)?;
    state
        .access_control
        .policy_admin_service()
        .add_inheritance_rule(&actor, rule)
        .await?;

    Ok(StatusCode::CREATED)
}

pub async fn remove_inheritance_rule_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<RemoveInheritanceRuleRequest>,
) -> ApiResult<Json<MutationResultResponse>> {
    let changed = state
        .access_control
        .policy_admin_service()
        .remove_inheritance_rule(
            &actor,
            payload.parent_role.as_str(),
            payload.child_role.as_str(),
        )
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}

pub async fn list_delegation_rules_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
) -> ApiResult<Json<Vec<DelegationRulePayload>>> {
    let rules = state
        .access_control
        .policy_admin_service()
        .list_delegation_rules(&actor)
        .await?
        .into_iter()
        .map(DelegationRulePayload::from)
        .collect();

    Ok(Json(rules))
}

pub async fn add_delegation_rule_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<DelegationRulePayload>,
) -> ApiResult<StatusCode> {
    let rule = DelegationRule::try_from(payload)?;
    state
        .access_control
        .policy_admin_service()
        .add_delegation_rule(&actor, rule)
        .await?;

    Ok(StatusCode::CREATED)
}

pub async fn remove_delegation_rule_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<RemoveDelegationRuleRequest>,
) -> ApiResult<Json<MutationResultResponse>> {
    let changed = state
        .access_control
        .policy_admin_service()
        .remove_delegation_rule(&actor, payload.from_role.as_str(), payload.to_role.as_str())
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}

pub async fn assign_global_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<GlobalRoleRequest>,
) -> ApiResult<Json<MutationResultResponse>> {
    let user_id = user_id(payload.user_id.as_str())?;
    let changed = state
        .access_control
        .assign_global_role(&actor, user_id, payload.role_name.as_str())
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}

pub async fn revoke_global_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Json(payload): Json<GlobalRoleRequest>,
) -> ApiResult<Json<MutationResultResponse>> {
    let user_id = user_id(payload.user_id.as_str())?;
    let changed = state
        .access_control
        .revoke_global_role(&actor, user_id, payload.role_name.as_str())
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}

pub async fn cache_stats_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
) -> ApiResult<Json<CacheStatsResponse>> {
    let (stats, ttl_seconds) = state.access_control.inspect_cache(&actor).await?;
    Ok(Json(CacheStatsResponse::new(stats, ttl_seconds)))
}
