use retreat_access_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a role record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Admin-managed role. Names are unique across the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    role_id: RoleId,
    name: NonEmptyString,
    description: String,
}

impl Role {
    /// Creates a role with a validated name.
    pub fn new(
        role_id: RoleId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name.into().trim())?;
        Ok(Self {
            role_id,
            name,
            description: description.into(),
        })
    }

    /// Returns the stable role identifier.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, RoleId};

    #[test]
    fn role_name_is_trimmed() {
        let role = Role::new(RoleId::new(), "  treasurer ", "handles payments");
        assert!(matches!(role, Ok(ref value) if value.name() == "treasurer"));
    }

    #[test]
    fn blank_role_name_is_rejected() {
        assert!(Role::new(RoleId::new(), " ", "").is_err());
    }
}
