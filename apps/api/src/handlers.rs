use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use retreat_access_core::{AuditContext, RetreatId, UserId};
use retreat_access_domain::PermissionKey;

use crate::dto::{
    AssignRetreatRoleRequest, CacheStatsResponse, CheckResponse, CreateDelegationRequest,
    DelegationCheckRequest, DelegationCheckResponse, DelegationResponse, DelegationRulePayload,
    GlobalRoleRequest, InheritanceRulePayload, InheritedPermissionsResponse,
    MutationResultResponse, OverrideEntryPayload, PermissionCheckQuery, PermissionOverridesResponse,
    PermissionSetResponse, RemoveDelegationRuleRequest, RemoveInheritanceRuleRequest,
    RetreatAccessResponse, RetreatMemberResponse, RevokeRetreatRoleRequest,
    SetPermissionOverridesRequest, format_permissions, parse_permissions, parse_timestamp,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub mod access;
pub mod admin;
pub mod delegations;
pub mod health;
pub mod members;
pub mod overrides;


fn retreat_path(value: &str) -> ApiResult<RetreatId> {
    Ok(RetreatId::parse(value)?)
}

fn user_id(value: &str) -> ApiResult<UserId> {
    Ok(UserId::parse(value)?)
}
