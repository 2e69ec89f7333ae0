use super::*;

use retreat_access_core::AppError;
use retreat_access_domain::OverrideEntry;

pub async fn get_overrides_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path((retreat_id, user)): Path<(String, String)>,
) -> ApiResult<Json<PermissionOverridesResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let user_id = user_id(user.as_str())?;

    // Users may read their own overrides; anyone else needs retreat access.
    if actor.actor() != user_id
        && !state
            .access_control
            .has_retreat_access(actor.actor(), retreat_id)
            .await?
    {
        return Err(AppError::Forbidden(format!(
            "user '{}' has no access to retreat '{retreat_id}'",
            actor.actor()
        ))
        .into());
    }

    let entries = state
        .access_control
        .get_permission_overrides(user_id, retreat_id)
        .await?
        .into_iter()
        .map(OverrideEntryPayload::from)
        .collect();

    Ok(Json(PermissionOverridesResponse {
        user_id: user_id.to_string(),
        retreat_id: retreat_id.to_string(),
        entries,
    }))
}

pub async fn set_overrides_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path((retreat_id, user)): Path<(String, String)>,
    Json(payload): Json<SetPermissionOverridesRequest>,
) -> ApiResult<StatusCode> {
    let retreat_id = retreat_path(&retreat_id)?;
    let user_id = user_id(user.as_str())?;
    let entries = payload
        .entries
        .into_iter()
        .map(OverrideEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    state
        .access_control
        .set_permission_override(
            &actor,
            user_id,
            retreat_id,
            entries,
            payload.reason.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_overrides_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path((retreat_id, user)): Path<(String, String)>,
) -> ApiResult<Json<MutationResultResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let user_id = user_id(user.as_str())?;

    let changed = state
        .access_control
        .clear_permission_overrides(&actor, user_id, retreat_id)
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}
