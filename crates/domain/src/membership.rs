use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use serde::{Deserialize, Serialize};

use crate::RoleId;

/// Lifecycle state of a retreat membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Invited but not yet accepted.
    Pending,
    /// Accepted and in force.
    Active,
    /// Lapsed past its expiry.
    Expired,
    /// Withdrawn by a retreat manager.
    Revoked,
}

impl MembershipStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Parses a stored status value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Validation(format!(
                "unknown membership status '{value}'"
            ))),
        }
    }

    /// Returns whether rows in this status confer retreat roles.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

/// One user's role assignment inside one retreat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatMembership {
    /// Member user.
    pub user_id: UserId,
    /// Retreat the role applies to.
    pub retreat_id: RetreatId,
    /// Referenced role.
    pub role_id: RoleId,
    /// Lifecycle state.
    pub status: MembershipStatus,
    /// User who issued the invitation, when known.
    pub invited_by: Option<UserId>,
    /// Invitation timestamp.
    pub invited_at: DateTime<Utc>,
    /// Optional hard expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RetreatMembership {
    /// Returns whether the membership confers its role at `now`.
    ///
    /// Rows past `expires_at` stop counting before the cleanup task marks them.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_live() && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    /// Returns whether the membership is active (not merely pending) at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Active && self.is_live_at(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use retreat_access_core::{RetreatId, UserId};

    use super::{MembershipStatus, RetreatMembership};
    use crate::RoleId;

    fn membership(status: MembershipStatus) -> RetreatMembership {
        RetreatMembership {
            user_id: UserId::new(),
            retreat_id: RetreatId::new(),
            role_id: RoleId::new(),
            status,
            invited_by: None,
            invited_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn pending_membership_is_live_but_not_active() {
        let pending = membership(MembershipStatus::Pending);
        let now = Utc::now();
        assert!(pending.is_live_at(now));
        assert!(!pending.is_active_at(now));
    }

    #[test]
    fn membership_past_expiry_is_not_live() {
        let mut active = membership(MembershipStatus::Active);
        active.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(!active.is_live_at(Utc::now()));
    }

    #[test]
    fn revoked_membership_is_not_live() {
        assert!(!membership(MembershipStatus::Revoked).is_live_at(Utc::now()));
    }

    #[test]
    fn status_roundtrips_storage_value() {
        for status in [
            MembershipStatus::Pending,
            MembershipStatus::Active,
            MembershipStatus::Expired,
            MembershipStatus::Revoked,
        ] {
            assert!(matches!(MembershipStatus::parse(status.as_str()), Ok(value) if value == status));
        }
    }
}
