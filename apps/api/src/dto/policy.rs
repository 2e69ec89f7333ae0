use retreat_access_application::CacheStats;
use retreat_access_core::{AppError, AppResult};
use retreat_access_domain::{DelegationRule, InheritanceCondition, InheritanceRule, PermissionKey};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{format_permissions, parse_permissions};

/// Activation condition of an inheritance edge.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/inheritance-condition-payload.ts"
)]
pub struct InheritanceConditionPayload {
    pub permission: String,
    pub required: bool,
}

/// API representation of an inheritance edge.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/inheritance-rule-payload.ts"
)]
pub struct InheritanceRulePayload {
    pub parent_role: String,
    pub child_role: String,
    pub inherit_permissions: bool,
    pub inherit_delegation: bool,
    #[serde(default)]
    pub conditions: Vec<InheritanceConditionPayload>,
}

/// Identifies an inheritance edge to remove.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/remove-inheritance-rule-request.ts"
)]
pub struct RemoveInheritanceRuleRequest {
    pub parent_role: String,
    pub child_role: String,
}

/// API representation of a delegation rule.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/delegation-rule-payload.ts"
)]
pub struct DelegationRulePayload {
    pub from_role: String,
    pub to_role: String,
    pub permissions: Vec<String>,
    pub max_duration_hours: u32,
    #[serde(default)]
    pub requires_approval: bool,
}

/// Identifies a delegation rule to remove.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/remove-delegation-rule-request.ts"
)]
pub struct RemoveDelegationRuleRequest {
    pub from_role: String,
    pub to_role: String,
}

/// Incoming payload for global role assignment and removal.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "api-types/global-role-request.ts"
)]
pub struct GlobalRoleRequest {
    pub user_id: String,
    pub role_name: String,
}

/// Permission cache counters of this process.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "api-types/cache-stats-response.ts"
)]
pub struct CacheStatsResponse {
    #[ts(type = "number")]
    pub hits: u64,
    #[ts(type = "number")]
    pub misses: u64,
    #[ts(type = "number")]
    pub writes: u64,
    #[ts(type = "number")]
    pub stale_writes_dropped: u64,
    #[ts(type = "number")]
    pub invalidations: u64,
    #[ts(type = "number")]
    pub backend_errors: u64,
    pub degraded: bool,
    #[ts(type = "number")]
    pub ttl_seconds: u64,
}

impl From<InheritanceRule> for InheritanceRulePayload {
    fn from(value: InheritanceRule) -> Self {
        Self {
            parent_role: value.parent_role().to_owned(),
            child_role: value.child_role().to_owned(),
            inherit_permissions: value.inherit_permissions(),
            inherit_delegation: value.inherit_delegation(),
            conditions: value
                .conditions()
                .iter()
                .map(|condition| InheritanceConditionPayload {
                    permission: condition.permission.to_string(),
                    required: condition.required,
                })
                .collect(),
        }
    }
}

impl TryFrom<InheritanceRulePayload> for InheritanceRule {
    type Error = AppError;

    fn try_from(value: InheritanceRulePayload) -> AppResult<Self> {
        let conditions = value
            .conditions
            .into_iter()
            .map(|condition| {
                Ok(InheritanceCondition {
                    permission: PermissionKey::parse(condition.permission.as_str())?,
                    required: condition.required,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        InheritanceRule::new(
            value.parent_role,
            value.child_role,
            value.inherit_permissions,
            value.inherit_delegation,
            conditions,
        )
    }
}

impl From<DelegationRule> for DelegationRulePayload {
    fn from(value: DelegationRule) -> Self {
        Self {
            from_role: value.from_role().to_owned(),
            to_role: value.to_role().to_owned(),
            permissions: format_permissions(value.permissions()),
            max_duration_hours: value.max_duration_hours(),
            requires_approval: value.requires_approval(),
        }
    }
}

impl TryFrom<DelegationRulePayload> for DelegationRule {
    type Error = AppError;

    fn try_from(value: DelegationRulePayload) -> AppResult<Self> {
        DelegationRule::new(
            value.from_role,
            value.to_role,
            parse_permissions(&value.permissions)?,
            value.max_duration_hours,
            value.requires_approval,
        )
    }
}

impl CacheStatsResponse {
    pub fn new(stats: CacheStats, ttl_seconds: u64) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            stale_writes_dropped: stats.stale_writes_dropped,
            invalidations: stats.invalidations,
            backend_errors: stats.backend_errors,
            degraded: stats.degraded,
            ttl_seconds,
        }
    }
}
