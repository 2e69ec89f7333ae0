use super::*;

pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
) -> ApiResult<Json<Vec<RetreatMemberResponse>>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let members = state
        .access_control
        .list_retreat_members(&actor, retreat_id)
        .await?
        .into_iter()
        .map(RetreatMemberResponse::from)
        .collect();

    Ok(Json(members))
}

pub async fn assign_member_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Json(payload): Json<AssignRetreatRoleRequest>,
) -> ApiResult<(StatusCode, Json<RetreatMemberResponse>)> {
    let retreat_id = retreat_path(&retreat_id)?;
    let user_id = user_id(payload.user_id.as_str())?;
    let expires_at = parse_timestamp(payload.expires_at.as_deref(), "expires_at")?;

    let membership = state
        .access_control
        .assign_retreat_role(
            &actor,
            user_id,
            retreat_id,
            payload.role_name.as_str(),
            expires_at,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RetreatMemberResponse::from(
            retreat_access_application::RetreatMember {
                membership,
                role_name: payload.role_name.trim().to_owned(),
            },
        )),
    ))
}

pub async fn revoke_member_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Json(payload): Json<RevokeRetreatRoleRequest>,
) -> ApiResult<Json<MutationResultResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let user_id = user_id(payload.user_id.as_str())?;

    let changed = state
        .access_control
        .revoke_retreat_role(&actor, user_id, retreat_id, payload.role_name.as_str())
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}
