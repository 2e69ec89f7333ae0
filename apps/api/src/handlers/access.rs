use super::*;

pub async fn retreat_access_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
) -> ApiResult<Json<RetreatAccessResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let has_access = state
        .access_control
        .has_retreat_access(actor.actor(), retreat_id)
        .await?;
    let is_creator = state
        .access_control
        .is_retreat_creator(actor.actor(), retreat_id)
        .await?;

    Ok(Json(RetreatAccessResponse {
        retreat_id: retreat_id.to_string(),
        has_access,
        is_creator,
    }))
}

pub async fn effective_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
) -> ApiResult<Json<PermissionSetResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let permissions = state
        .access_control
        .effective_permissions(actor.actor(), retreat_id)
        .await?;

    Ok(Json(PermissionSetResponse {
        user_id: actor.actor().to_string(),
        retreat_id: retreat_id.to_string(),
        permissions: format_permissions(&permissions),
    }))
}

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Query(query): Query<PermissionCheckQuery>,
) -> ApiResult<Json<CheckResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let permission = PermissionKey::parse(query.permission.as_str())?;
    let allowed = state
        .access_control
        .has_permission(actor.actor(), retreat_id, &permission)
        .await?;

    Ok(Json(CheckResponse { allowed }))
}

pub async fn check_retreat_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path((retreat_id, role_name)): Path<(String, String)>,
) -> ApiResult<Json<CheckResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let allowed = state
        .access_control
        .has_retreat_role(actor.actor(), retreat_id, role_name.as_str())
        .await?;

    Ok(Json(CheckResponse { allowed }))
}

pub async fn inherited_permissions_handler(
    State(state): State<AppState>,
    Extension(_actor): Extension<AuditContext>,
    Path((retreat_id, role_name)): Path<(String, String)>,
) -> ApiResult<Json<InheritedPermissionsResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let permissions = state
        .access_control
        .get_inherited_permissions(role_name.as_str(), retreat_id)
        .await?;

    Ok(Json(InheritedPermissionsResponse {
        role_name,
        retreat_id: retreat_id.to_string(),
        permissions: format_permissions(&permissions),
    }))
}

pub async fn check_global_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(role_name): Path<String>,
) -> ApiResult<Json<CheckResponse>> {
    let allowed = state
        .access_control
        .has_role(actor.actor(), role_name.as_str())
        .await?;

    Ok(Json(CheckResponse { allowed }))
}
