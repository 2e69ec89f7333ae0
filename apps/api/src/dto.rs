mod access;
mod grants;
mod policy;

pub use access::{
    AssignRetreatRoleRequest, CheckResponse, HealthResponse, InheritedPermissionsResponse,
    MutationResultResponse, PermissionCheckQuery, PermissionSetResponse, RetreatAccessResponse,
    RetreatMemberResponse, RevokeRetreatRoleRequest,
};
pub use grants::{
    CreateDelegationRequest, DelegationCheckRequest, DelegationCheckResponse, DelegationResponse,
    OverrideEntryPayload, PermissionOverridesResponse, SetPermissionOverridesRequest,
};
pub use policy::{
    CacheStatsResponse, DelegationRulePayload, GlobalRoleRequest, InheritanceConditionPayload,
    InheritanceRulePayload, RemoveDelegationRuleRequest, RemoveInheritanceRuleRequest,
};

use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult};
use retreat_access_domain::PermissionKey;

pub(crate) fn parse_permissions(values: &[String]) -> AppResult<Vec<PermissionKey>> {
    values
        .iter()
        .map(|value| PermissionKey::parse(value.as_str()))
        .collect()
}

pub(crate) fn format_permissions<'a>(
    permissions: impl IntoIterator<Item = &'a PermissionKey>,
) -> Vec<String> {
    permissions.into_iter().map(ToString::to_string).collect()
}

pub(crate) fn parse_timestamp(value: Option<&str>, field: &str) -> AppResult<Option<DateTime<Utc>>> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| AppError::Validation(format!("invalid {field} '{value}': {error}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::{
        AssignRetreatRoleRequest, CacheStatsResponse, CheckResponse, CreateDelegationRequest,
        DelegationCheckRequest, DelegationCheckResponse, DelegationResponse,
        DelegationRulePayload, GlobalRoleRequest, HealthResponse, InheritanceConditionPayload,
        InheritanceRulePayload, InheritedPermissionsResponse, MutationResultResponse,
        OverrideEntryPayload, PermissionOverridesResponse, PermissionSetResponse,
        RemoveDelegationRuleRequest, RemoveInheritanceRuleRequest, RetreatAccessResponse,
        RetreatMemberResponse, RevokeRetreatRoleRequest, SetPermissionOverridesRequest,
        parse_timestamp,
    };

    use crate::error::ErrorResponse;
    use ts_rs::Config;
    use ts_rs::TS;

    #[test]
    fn export_ts_bindings() -> Result<(), ts_rs::ExportError> {
        let config = Config::default();

        HealthResponse::export(&config)?;
        RetreatAccessResponse::export(&config)?;
        PermissionSetResponse::export(&config)?;
        CheckResponse::export(&config)?;
        InheritedPermissionsResponse::export(&config)?;
        RetreatMemberResponse::export(&config)?;
        AssignRetreatRoleRequest::export(&config)?;
        RevokeRetreatRoleRequest::export(&config)?;
        MutationResultResponse::export(&config)?;
        DelegationCheckRequest::export(&config)?;
        DelegationCheckResponse::export(&config)?;
        CreateDelegationRequest::export(&config)?;
        DelegationResponse::export(&config)?;
        OverrideEntryPayload::export(&config)?;
        SetPermissionOverridesRequest::export(&config)?;
        PermissionOverridesResponse::export(&config)?;
        InheritanceConditionPayload::export(&config)?;
        InheritanceRulePayload::export(&config)?;
        RemoveInheritanceRuleRequest::export(&config)?;
        DelegationRulePayload::export(&config)?;
        RemoveDelegationRuleRequest::export(&config)?;
        GlobalRoleRequest::export(&config)?;
        CacheStatsResponse::export(&config)?;
        ErrorResponse::export(&config)?;

        Ok(())
    }

    #[test]
    fn ts_bindings_stay_inside_the_export_directory() {
        let paths = [
            ErrorResponse::output_path(),
            HealthResponse::output_path(),
            DelegationResponse::output_path(),
            CacheStatsResponse::output_path(),
        ];

        for path in paths {
            assert!(path.is_some_and(|path| {
                path.starts_with("api-types")
                    && path
                        .components()
                        .all(|component| !matches!(component, std::path::Component::ParentDir))
            }));
        }
    }

    #[test]
    fn timestamps_accept_rfc3339_with_offsets() {
        let parsed = parse_timestamp(Some("2026-05-01T10:00:00+02:00"), "expires_at");
        assert!(matches!(parsed, Ok(Some(ref value)) if value.to_rfc3339() == "2026-05-01T08:00:00+00:00"));
        assert!(matches!(parse_timestamp(Some(" "), "expires_at"), Ok(None)));
        assert!(parse_timestamp(Some("tomorrow"), "expires_at").is_err());
    }
}
