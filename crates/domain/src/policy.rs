//! Declarative role policy: inheritance edges and delegation rules.

use std::collections::BTreeSet;

use retreat_access_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::PermissionKey;

/// Activation condition attached to an inheritance rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceCondition {
    /// Permission some active member of the retreat must hold.
    pub permission: PermissionKey,
    /// Non-required conditions are informational and always hold.
    pub required: bool,
}

/// Directed parent -> child edge in the role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceRule {
    parent_role: String,
    child_role: String,
    inherit_permissions: bool,
    inherit_delegation: bool,
    conditions: Vec<InheritanceCondition>,
}

impl InheritanceRule {
    /// Creates a validated inheritance rule.
    pub fn new(
        parent_role: impl Into<String>,
        child_role: impl Into<String>,
        inherit_permissions: bool,
        inherit_delegation: bool,
        conditions: Vec<InheritanceCondition>,
    ) -> AppResult<Self> {
        let parent_role = normalize_role_name(parent_role.into(), "parent_role")?;
        let child_role = normalize_role_name(child_role.into(), "child_role")?;

        if parent_role == child_role {
            return Err(AppError::Validation(format!(
                "inheritance rule for role '{parent_role}' must not point to itself"
            )));
        }

        Ok(Self {
            parent_role,
            child_role,
            inherit_permissions,
            inherit_delegation,
            conditions,
        })
    }

    /// Returns the parent role name.
    #[must_use]
    pub fn parent_role(&self) -> &str {
        self.parent_role.as_str()
    }

    /// Returns the child role name.
    #[must_use]
    pub fn child_role(&self) -> &str {
        self.child_role.as_str()
    }

    /// Returns whether the parent gains the child's permissions.
    #[must_use]
    pub fn inherit_permissions(&self) -> bool {
        self.inherit_permissions
    }

    /// Returns whether the parent gains the child's delegation rights.
    #[must_use]
    pub fn inherit_delegation(&self) -> bool {
        self.inherit_delegation
    }

    /// Returns activation conditions in declaration order.
    #[must_use]
    pub fn conditions(&self) -> &[InheritanceCondition] {
        &self.conditions
    }

    /// Returns whether this rule shares its edge with another rule.
    #[must_use]
    pub fn same_edge(&self, parent_role: &str, child_role: &str) -> bool {
        self.parent_role == parent_role && self.child_role == child_role
    }
}

/// Static policy describing which permissions one role may lend to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRule {
    from_role: String,
    to_role: String,
    permissions: BTreeSet<PermissionKey>,
    max_duration_hours: u32,
    requires_approval: bool,
}

impl DelegationRule {
    /// Creates a validated delegation rule.
    pub fn new(
        from_role: impl Into<String>,
        to_role: impl Into<String>,
        permissions: impl IntoIterator<Item = PermissionKey>,
        max_duration_hours: u32,
        requires_approval: bool,
    ) -> AppResult<Self> {
        let from_role = normalize_role_name(from_role.into(), "from_role")?;
        let to_role = normalize_role_name(to_role.into(), "to_role")?;
        let permissions: BTreeSet<PermissionKey> = permissions.into_iter().collect();

        if permissions.is_empty() {
            return Err(AppError::Validation(format!(
                "delegation rule '{from_role}' -> '{to_role}' must list at least one permission"
            )));
        }

        if max_duration_hours == 0 {
            return Err(AppError::Validation(format!(
                "delegation rule '{from_role}' -> '{to_role}' max_duration_hours must be greater than zero"
            )));
        }

        Ok(Self {
            from_role,
            to_role,
            permissions,
            max_duration_hours,
            requires_approval,
        })
    }

    /// Returns the delegating role name.
    #[must_use]
    pub fn from_role(&self) -> &str {
        self.from_role.as_str()
    }

    /// Returns the receiving role name.
    #[must_use]
    pub fn to_role(&self) -> &str {
        self.to_role.as_str()
    }

    /// Returns the delegable permission set.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<PermissionKey> {
        &self.permissions
    }

    /// Returns the longest allowed delegation in hours.
    #[must_use]
    pub fn max_duration_hours(&self) -> u32 {
        self.max_duration_hours
    }

    /// Returns whether delegations under this rule need approval.
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    /// Returns whether every requested permission is delegable under this rule.
    #[must_use]
    pub fn allows_all<'a>(&self, requested: impl IntoIterator<Item = &'a PermissionKey>) -> bool {
        requested
            .into_iter()
            .all(|permission| self.permissions.contains(permission))
    }

    /// Returns whether this rule shares its edge with another rule.
    #[must_use]
    pub fn same_edge(&self, from_role: &str, to_role: &str) -> bool {
        self.from_role == from_role && self.to_role == to_role
    }
}

fn normalize_role_name(value: String, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }

    Ok(trimmed.to_owned())
}
