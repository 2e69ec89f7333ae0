use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PermissionKey;

/// Unique identifier for a delegation grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelegationId(Uuid);

impl DelegationId {
    /// Creates a new random delegation identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a delegation identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a transport value into a delegation identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid delegation id '{value}': {error}")))
    }
}

impl Default for DelegationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DelegationId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle state of a delegation grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    /// In force until `expires_at`.
    Active,
    /// Withdrawn before expiry.
    Revoked,
    /// Marked by the cleanup task after expiry.
    Expired,
}

impl DelegationStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    /// Parses a stored status value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown delegation status '{value}'"
            ))),
        }
    }
}

/// Time-bounded grant of specific permissions from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Stable grant id.
    pub delegation_id: DelegationId,
    /// Delegating user.
    pub from_user: UserId,
    /// Receiving user.
    pub to_user: UserId,
    /// Retreat the grant applies to.
    pub retreat_id: RetreatId,
    /// Lent permissions.
    pub permissions: BTreeSet<PermissionKey>,
    /// Lifecycle state.
    pub status: DelegationStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Revocation timestamp, when revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// User who revoked the grant, when revoked.
    pub revoked_by: Option<UserId>,
}

impl Delegation {
    /// Returns whether the grant confers permissions at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == DelegationStatus::Active && self.expires_at > now
    }

    /// Returns whether the user is either party to the grant.
    #[must_use]
    pub fn involves(&self, user_id: UserId) -> bool {
        self.from_user == user_id || self.to_user == user_id
    }
}
