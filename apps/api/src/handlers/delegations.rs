use super::*;

use retreat_access_application::CreateDelegationInput;
use retreat_access_domain::DelegationId;

#[derive(Debug, serde::Deserialize)]
pub struct DelegationListQuery {
    /// Lists every delegation of the retreat instead of the caller's own.
    #[serde(default)]
    pub all: bool,
}

pub async fn check_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Json(payload): Json<DelegationCheckRequest>,
) -> ApiResult<Json<DelegationCheckResponse>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let to_user = user_id(payload.to_user_id.as_str())?;
    let permissions = parse_permissions(&payload.permissions)?;

    let check = state
        .access_control
        .can_delegate_permissions(actor.actor(), to_user, retreat_id, &permissions)
        .await?;

    Ok(Json(DelegationCheckResponse::from(check)))
}

pub async fn list_delegations_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Query(query): Query<DelegationListQuery>,
) -> ApiResult<Json<Vec<DelegationResponse>>> {
    let retreat_id = retreat_path(&retreat_id)?;
    let delegations = if query.all {
        state
            .access_control
            .delegation_service()
            .list_retreat_delegations(&actor, retreat_id)
            .await?
    } else {
        state
            .access_control
            .get_active_delegations(actor.actor(), Some(retreat_id))
            .await?
    };

    Ok(Json(
        delegations
            .into_iter()
            .map(DelegationResponse::from)
            .collect(),
    ))
}

pub async fn create_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(retreat_id): Path<String>,
    Json(payload): Json<CreateDelegationRequest>,
) -> ApiResult<(StatusCode, Json<DelegationResponse>)> {
    let retreat_id = retreat_path(&retreat_id)?;
    let input = CreateDelegationInput {
        to_user: user_id(payload.to_user_id.as_str())?,
        retreat_id,
        permissions: parse_permissions(&payload.permissions)?,
        duration_hours: payload.duration_hours,
    };

    let delegation = state
        .access_control
        .create_permission_delegation(&actor, input)
        .await?;

    Ok((StatusCode::CREATED, Json(DelegationResponse::from(delegation))))
}

pub async fn revoke_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<AuditContext>,
    Path(delegation_id): Path<String>,
) -> ApiResult<Json<MutationResultResponse>> {
    let delegation_id = DelegationId::parse(delegation_id.as_str())?;
    let changed = state
        .access_control
        .revoke_delegation(&actor, delegation_id)
        .await?;

    Ok(Json(MutationResultResponse { changed }))
}
