use retreat_access_application::RetreatMember;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// Caller's standing in a retreat.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/retreat-access-response.ts"
)]
pub struct RetreatAccessResponse {
    pub retreat_id: String,
    pub has_access: bool,
    pub is_creator: bool,
}

/// Sorted permission set of a user in a retreat.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/permission-set-response.ts"
)]
pub struct PermissionSetResponse {
    pub user_id: String,
    pub retreat_id: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionCheckQuery {
    pub permission: String,
}

/// Boolean decision payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/check-response.ts"
)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Permissions a role yields in a retreat through inheritance.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/inherited-permissions-response.ts"
)]
pub struct InheritedPermissionsResponse {
    pub role_name: String,
    pub retreat_id: String,
    pub permissions: Vec<String>,
}

/// API representation of a membership row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/retreat-member-response.ts"
)]
pub struct RetreatMemberResponse {
    pub user_id: String,
    pub retreat_id: String,
    pub role_name: String,
    pub status: String,
    pub invited_by: Option<String>,
    pub invited_at: String,
    pub expires_at: Option<String>,
}

/// Incoming payload for retreat role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/assign-retreat-role-request.ts"
)]
pub struct AssignRetreatRoleRequest {
    pub user_id: String,
    pub role_name: String,
    pub expires_at: Option<String>,
}

/// Incoming payload for retreat role revocation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/revoke-retreat-role-request.ts"
)]
pub struct RevokeRetreatRoleRequest {
    pub user_id: String,
    pub role_name: String,
}

/// Whether a mutation changed stored state.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/mutation-result-response.ts"
)]
pub struct MutationResultResponse {
    pub changed: bool,
}

impl From<RetreatMember> for RetreatMemberResponse {
    fn from(value: RetreatMember) -> Self {
        let membership = value.membership;
        Self {
            user_id: membership.user_id.to_string(),
            retreat_id: membership.retreat_id.to_string(),
            role_name: value.role_name,
            status: membership.status.as_str().to_owned(),
            invited_by: membership.invited_by.map(|user_id| user_id.to_string()),
            invited_at: membership.invited_at.to_rfc3339(),
            expires_at: membership.expires_at.map(|value| value.to_rfc3339()),
        }
    }
}
