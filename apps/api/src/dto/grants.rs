use retreat_access_application::DelegationCheck;
use retreat_access_core::{AppError, AppResult};
use retreat_access_domain::{Delegation, OverrideEntry, PermissionKey};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{format_permissions, parse_timestamp};

/// Prospective delegation to validate.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/delegation-check-request.ts"
)]
pub struct DelegationCheckRequest {
    pub to_user_id: String,
    pub permissions: Vec<String>,
}

/// Outcome of a delegation policy check.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/delegation-check-response.ts"
)]
pub struct DelegationCheckResponse {
    pub can_delegate: bool,
    pub requires_approval: bool,
    pub max_duration_hours: u32,
}

/// Incoming payload for delegation creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/create-delegation-request.ts"
)]
pub struct CreateDelegationRequest {
    pub to_user_id: String,
    pub permissions: Vec<String>,
    pub duration_hours: Option<u32>,
}

/// API representation of a delegation.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/delegation-response.ts"
)]
pub struct DelegationResponse {
    pub delegation_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub retreat_id: String,
    pub permissions: Vec<String>,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
    pub revoked_at: Option<String>,
    pub revoked_by: Option<String>,
}

/// One ordered allow or deny entry.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/override-entry-payload.ts"
)]
pub struct OverrideEntryPayload {
    pub permission: String,
    pub granted: bool,
    pub expires_at: Option<String>,
}

/// Replacement override list for a user in a retreat.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/set-permission-overrides-request.ts"
)]
pub struct SetPermissionOverridesRequest {
    pub entries: Vec<OverrideEntryPayload>,
    pub reason: Option<String>,
}

/// Stored overrides of a user in a retreat, in application order.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/permission-overrides-response.ts"
)]
pub struct PermissionOverridesResponse {
    pub user_id: String,
    pub retreat_id: String,
    pub entries: Vec<OverrideEntryPayload>,
}

impl From<DelegationCheck> for DelegationCheckResponse {
    fn from(value: DelegationCheck) -> Self {
        Self {
            can_delegate: value.can_delegate,
            requires_approval: value.requires_approval,
            max_duration_hours: value.max_duration_hours,
        }
    }
}

impl From<Delegation> for DelegationResponse {
    fn from(value: Delegation) -> Self {
        Self {
            delegation_id: value.delegation_id.to_string(),
            from_user_id: value.from_user.to_string(),
            to_user_id: value.to_user.to_string(),
            retreat_id: value.retreat_id.to_string(),
            permissions: format_permissions(&value.permissions),
            status: value.status.as_str().to_owned(),
            created_at: value.created_at.to_rfc3339(),
            expires_at: value.expires_at.to_rfc3339(),
            revoked_at: value.revoked_at.map(|revoked_at| revoked_at.to_rfc3339()),
            revoked_by: value.revoked_by.map(|user_id| user_id.to_string()),
        }
    }
}

impl From<OverrideEntry> for OverrideEntryPayload {
    fn from(value: OverrideEntry) -> Self {
        Self {
            permission: value.permission.to_string(),
            granted: value.granted,
            expires_at: value.expires_at.map(|expires_at| expires_at.to_rfc3339()),
        }
    }
}

impl TryFrom<OverrideEntryPayload> for OverrideEntry {
    type Error = AppError;

    fn try_from(value: OverrideEntryPayload) -> AppResult<Self> {
        Ok(Self {
            permission: PermissionKey::parse(value.permission.as_str())?,
            granted: value.granted,
            expires_at: parse_timestamp(value.expires_at.as_deref(), "expires_at")?,
        })
    }
}
