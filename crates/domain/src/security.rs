use std::fmt::{Display, Formatter};
use std::str::FromStr;

use retreat_access_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Global role whose holders may enter every retreat.
pub const SUPERADMIN_ROLE: &str = "superadmin";

/// Resource half of the permission that gates administrative surfaces.
pub const SYSTEM_RESOURCE: &str = "system";

/// Operation half of the permission that gates administrative surfaces.
pub const ADMIN_OPERATION: &str = "admin";

/// Structured `(resource, operation)` permission.
///
/// Serialized as `"resource:operation"` at every boundary. Parsing splits at
/// the first `:`, so resources never contain a colon while operations may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey {
    resource: String,
    operation: String,
}

impl PermissionKey {
    /// Creates a validated permission key.
    pub fn new(resource: impl Into<String>, operation: impl Into<String>) -> AppResult<Self> {
        let resource = resource.into().trim().to_owned();
        let operation = operation.into().trim().to_owned();

        if resource.is_empty() || operation.is_empty() {
            return Err(AppError::Validation(
                "permission resource and operation must not be empty".to_owned(),
            ));
        }

        if resource.contains(':') {
            return Err(AppError::Validation(format!(
                "permission resource '{resource}' must not contain ':'"
            )));
        }

        Ok(Self {
            resource,
            operation,
        })
    }

    /// Returns the `system:admin` permission.
    #[must_use]
    pub fn system_admin() -> Self {
        Self {
            resource: SYSTEM_RESOURCE.to_owned(),
            operation: ADMIN_OPERATION.to_owned(),
        }
    }

    /// Parses a `"resource:operation"` transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        let (resource, operation) = value.split_once(':').ok_or_else(|| {
            AppError::Validation(format!(
                "permission '{value}' must use the 'resource:operation' form"
            ))
        })?;

        Self::new(resource, operation)
    }

    /// Returns the resource half.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the operation half.
    #[must_use]
    pub fn operation(&self) -> &str {
        self.operation.as_str()
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.resource, self.operation)
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<PermissionKey> for String {
    fn from(value: PermissionKey) -> Self {
        value.to_string()
    }
}

/// Stable audit actions emitted by permission-affecting mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a retreat role is assigned or reactivated.
    RetreatRoleAssigned,
    /// Emitted when a retreat role is revoked.
    RetreatRoleRevoked,
    /// Emitted when the cleanup task expires memberships.
    RetreatMembershipsExpired,
    /// Emitted when a global role is assigned.
    GlobalRoleAssigned,
    /// Emitted when a global role is removed.
    GlobalRoleRevoked,
    /// Emitted when a delegation is created.
    DelegationCreated,
    /// Emitted when a delegation is revoked.
    DelegationRevoked,
    /// Emitted when the cleanup task expires delegations.
    DelegationsExpired,
    /// Emitted when a user's overrides are replaced.
    PermissionOverridesSet,
    /// Emitted when a user's overrides are cleared.
    PermissionOverridesCleared,
    /// Emitted when an inheritance rule is added.
    InheritanceRuleAdded,
    /// Emitted when an inheritance rule is removed.
    InheritanceRuleRemoved,
    /// Emitted when a delegation rule is added.
    DelegationRuleAdded,
    /// Emitted when a delegation rule is removed.
    DelegationRuleRemoved,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetreatRoleAssigned => "retreat.role.assigned",
            Self::RetreatRoleRevoked => "retreat.role.revoked",
            Self::RetreatMembershipsExpired => "retreat.memberships.expired",
            Self::GlobalRoleAssigned => "global.role.assigned",
            Self::GlobalRoleRevoked => "global.role.revoked",
            Self::DelegationCreated => "delegation.created",
            Self::DelegationRevoked => "delegation.revoked",
            Self::DelegationsExpired => "delegation.expired",
            Self::PermissionOverridesSet => "override.set",
            Self::PermissionOverridesCleared => "override.cleared",
            Self::InheritanceRuleAdded => "policy.inheritance_rule.added",
            Self::InheritanceRuleRemoved => "policy.inheritance_rule.removed",
            Self::DelegationRuleAdded => "policy.delegation_rule.added",
            Self::DelegationRuleRemoved => "policy.delegation_rule.removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::PermissionKey;

    #[test]
    fn permission_key_formats_as_resource_operation() {
        let permission = PermissionKey::new("payment", "read");
        assert!(matches!(permission, Ok(ref value) if value.to_string() == "payment:read"));
    }

    #[test]
    fn permission_without_separator_is_rejected() {
        assert!(PermissionKey::parse("payment.read").is_err());
        assert!(PermissionKey::parse(":read").is_err());
        assert!(PermissionKey::parse("payment:").is_err());
    }

    #[test]
    fn operation_may_contain_separator() {
        let permission = PermissionKey::parse("report:export:csv");
        assert!(matches!(
            permission,
            Ok(ref value) if value.resource() == "report" && value.operation() == "export:csv"
        ));
    }

    #[test]
    fn permission_serializes_as_string() {
        let permission = PermissionKey::system_admin();
        let encoded = serde_json::to_string(&permission).unwrap_or_default();
        assert_eq!(encoded, "\"system:admin\"");
    }

    proptest! {
        #[test]
        fn parse_accepts_every_well_formed_key(
            resource in "[a-z_]{1,12}",
            operation in "[a-z_:]{1,12}",
        ) {
            let parsed = PermissionKey::parse(format!("{resource}:{operation}").as_str());
            prop_assert!(parsed.is_ok());
            let parsed = parsed.unwrap_or_else(|_| PermissionKey::system_admin());
            prop_assert_eq!(parsed.resource(), resource.as_str());
            prop_assert_eq!(parsed.operation(), operation.as_str());
        }
    }
}
