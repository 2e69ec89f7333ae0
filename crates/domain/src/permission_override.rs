//! Per-user, per-retreat explicit allow/deny adjustments.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use retreat_access_core::{RetreatId, UserId};
use serde::{Deserialize, Serialize};

use crate::PermissionKey;

/// One allow or deny adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideEntry {
    /// Adjusted permission.
    pub permission: PermissionKey,
    /// `true` adds the permission, `false` removes it.
    pub granted: bool,
    /// Entries past this instant are skipped, not deleted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl OverrideEntry {
    /// Returns whether the entry still applies at `now`.
    #[must_use]
    pub fn is_in_force_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// The single override record held for a (user, retreat) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// Adjusted user.
    pub user_id: UserId,
    /// Retreat scope.
    pub retreat_id: RetreatId,
    /// Entries in stored order. Order decides conflicts.
    pub entries: Vec<OverrideEntry>,
    /// Justification captured when the record was written.
    pub reason: String,
    /// User who wrote the record.
    pub set_by: UserId,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PermissionOverride {
    /// Applies the entries to a base permission set.
    #[must_use]
    pub fn apply_to(
        &self,
        base: BTreeSet<PermissionKey>,
        now: DateTime<Utc>,
    ) -> BTreeSet<PermissionKey> {
        apply_override_entries(base, &self.entries, now)
    }

    /// Returns the earliest future expiry among the entries.
    #[must_use]
    pub fn next_expiry_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter_map(|entry| entry.expires_at)
            .filter(|expires_at| *expires_at > now)
            .min()
    }
}

/// Applies override entries in stored order; the last in-force entry for a
/// permission wins.
#[must_use]
pub fn apply_override_entries(
    mut permissions: BTreeSet<PermissionKey>,
    entries: &[OverrideEntry],
    now: DateTime<Utc>,
) -> BTreeSet<PermissionKey> {
    for entry in entries.iter().filter(|entry| entry.is_in_force_at(now)) {
        if entry.granted {
            permissions.insert(entry.permission.clone());
        } else {
            permissions.remove(&entry.permission);
        }
    }

    permissions
}

/// Applies only the deny entries whose last in-force word is a deny.
///
/// Used when the user no longer holds retreat access, so grants must not
/// widen anything while earlier denials keep holding.
#[must_use]
pub fn apply_override_denials(
    mut permissions: BTreeSet<PermissionKey>,
    entries: &[OverrideEntry],
    now: DateTime<Utc>,
) -> BTreeSet<PermissionKey> {
    let outcome = apply_override_entries(BTreeSet::new(), entries, now);
    for entry in entries.iter().filter(|entry| entry.is_in_force_at(now)) {
        if !outcome.contains(&entry.permission) {
            permissions.remove(&entry.permission);
        }
    }

    permissions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use super::{OverrideEntry, apply_override_denials, apply_override_entries};
    use crate::PermissionKey;

    fn key(value: &str) -> PermissionKey {
        PermissionKey::parse(value).unwrap_or_else(|_| PermissionKey::system_admin())
    }

    fn entry(value: &str, granted: bool) -> OverrideEntry {
        OverrideEntry {
            permission: key(value),
            granted,
            expires_at: None,
        }
    }

    #[test]
    fn last_entry_for_a_permission_wins() {
        let entries = vec![entry("x:y", true), entry("x:y", false)];
        let result = apply_override_entries(BTreeSet::new(), &entries, Utc::now());
        assert!(!result.contains(&key("x:y")));

        let entries = vec![entry("x:y", false), entry("x:y", true)];
        let result = apply_override_entries(BTreeSet::new(), &entries, Utc::now());
        assert!(result.contains(&key("x:y")));
    }

    #[test]
    fn expired_entries_are_skipped() {
        let now = Utc::now();
        let entries = vec![
            entry("payment:read", true),
            OverrideEntry {
                permission: key("payment:read"),
                granted: false,
                expires_at: Some(now - Duration::minutes(5)),
            },
        ];

        let result = apply_override_entries(BTreeSet::new(), &entries, now);
        assert!(result.contains(&key("payment:read")));
    }

    #[test]
    fn denials_only_never_grants() {
        let base = BTreeSet::from([key("payment:read"), key("event:view")]);
        let entries = vec![
            entry("payment:read", false),
            entry("vendor:manage", true),
            entry("event:view", false),
            entry("event:view", true),
        ];

        let result = apply_override_denials(base, &entries, Utc::now());
        assert_eq!(result, BTreeSet::from([key("event:view")]));
    }

    #[test]
    fn deny_removes_base_permission() {
        let base = BTreeSet::from([key("inventory:write"), key("inventory:read")]);
        let result = apply_override_entries(base, &[entry("inventory:write", false)], Utc::now());
        assert_eq!(result, BTreeSet::from([key("inventory:read")]));
    }

    proptest! {
        #[test]
        fn outcome_follows_last_in_force_entry(
            in_base in any::<bool>(),
            entries in prop::collection::vec((any::<bool>(), any::<bool>()), 0..12),
        ) {
            let now = Utc::now();
            let target = key("x:y");
            let base = if in_base { BTreeSet::from([target.clone()]) } else { BTreeSet::new() };
            let entries: Vec<OverrideEntry> = entries
                .into_iter()
                .map(|(granted, expired)| OverrideEntry {
                    permission: target.clone(),
                    granted,
                    expires_at: expired.then(|| now - Duration::seconds(1)),
                })
                .collect();

            let expected = entries
                .iter()
                .rev()
                .find(|entry| entry.is_in_force_at(now))
                .map_or(in_base, |entry| entry.granted);

            let result = apply_override_entries(base, &entries, now);
            prop_assert_eq!(result.contains(&target), expected);
        }
    }
}
