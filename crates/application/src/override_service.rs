use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use retreat_access_core::{AppError, AppResult, AuditContext, RetreatId, UserId};
use retreat_access_domain::{
    AuditAction, OverrideEntry, PermissionKey, PermissionOverride, apply_override_denials,
};
use tracing::info;

use crate::audit_trail::AuditTrail;
use crate::{AuditEvent, CacheStore, OverrideRepository, RetreatAuthority};

/// Result of applying a user's overrides to a base set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedOverrides {
    /// Final permission set.
    pub permissions: BTreeSet<PermissionKey>,
    /// Earliest future expiry among the override entries.
    pub next_expiry: Option<DateTime<Utc>>,
}

/// Explicit per-user, per-retreat allow/deny adjustments.
#[derive(Clone)]
pub struct OverrideService {
    repository: Arc<dyn OverrideRepository>,
    authority: RetreatAuthority,
    cache: CacheStore,
    audit: AuditTrail,
}

impl OverrideService {
    pub(crate) fn new(
        repository: Arc<dyn OverrideRepository>,
        authority: RetreatAuthority,
        cache: CacheStore,
        audit: AuditTrail,
    ) -> Self {
        Self {
            repository,
            authority,
            cache,
            audit,
        }
    }

    /// Replaces the user's override entries in the retreat. An empty list
    /// clears the record.
    pub async fn set(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
        entries: Vec<OverrideEntry>,
        reason: &str,
    ) -> AppResult<()> {
        if entries.is_empty() {
            self.clear(actor, user_id, retreat_id).await?;
            return Ok(());
        }

        self.authority
            .require_retreat_manager(actor.actor(), retreat_id)
            .await?;

        if !self.authority.has_retreat_access(user_id, retreat_id).await? {
            return Err(AppError::PolicyViolation(format!(
                "user '{user_id}' has no access to retreat '{retreat_id}'; overrides cannot grant initial access"
            )));
        }

        let reason = reason.trim();
        let entry_count = entries.len();
        let summary = entries
            .iter()
            .map(|entry| format!("{}{}", if entry.granted { "+" } else { "-" }, entry.permission))
            .collect::<Vec<_>>()
            .join(", ");

        self.repository
            .save_override(PermissionOverride {
                user_id,
                retreat_id,
                entries,
                reason: reason.to_owned(),
                set_by: actor.actor(),
                updated_at: Utc::now(),
            })
            .await?;
        self.cache.invalidate_grants(user_id, retreat_id).await;

        info!(
            user_id = %user_id,
            retreat_id = %retreat_id,
            entry_count,
            "permission overrides set"
        );
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::PermissionOverridesSet,
                    "permission_override",
                    user_id.to_string(),
                )
                .in_retreat(retreat_id)
                .by(actor)
                .with_detail(format!("[{summary}] reason: {reason}")),
            )
            .await;

        Ok(())
    }

    /// Returns the stored entries in order, including lapsed ones.
    pub async fn get(&self, user_id: UserId, retreat_id: RetreatId) -> AppResult<Vec<OverrideEntry>> {
        Ok(self
            .repository
            .find_override(user_id, retreat_id)
            .await?
            .map(|record| record.entries)
            .unwrap_or_default())
    }

    /// Deletes the user's override record. Returns whether one existed.
    pub async fn clear(
        &self,
        actor: &AuditContext,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<bool> {
        self.authority
            .require_retreat_manager(actor.actor(), retreat_id)
            .await?;

        let existed = self.repository.delete_override(user_id, retreat_id).await?;
        self.cache.invalidate_grants(user_id, retreat_id).await;

        if existed {
            info!(user_id = %user_id, retreat_id = %retreat_id, "permission overrides cleared");
            self.audit
                .record(
                    AuditEvent::new(
                        AuditAction::PermissionOverridesCleared,
                        "permission_override",
                        user_id.to_string(),
                    )
                    .in_retreat(retreat_id)
                    .by(actor),
                )
                .await;
        }

        Ok(existed)
    }

    /// Applies the user's in-force entries to a base permission set.
    pub async fn apply(
        &self,
        base: BTreeSet<PermissionKey>,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<BTreeSet<PermissionKey>> {
        Ok(self
            .apply_detailed(base, user_id, retreat_id, true)
            .await?
            .permissions)
    }

    /// Applies overrides and reports when the outcome next changes. Grant
    /// entries are ignored when `allow_grants` is false.
    pub(crate) async fn apply_detailed(
        &self,
        base: BTreeSet<PermissionKey>,
        user_id: UserId,
        retreat_id: RetreatId,
        allow_grants: bool,
    ) -> AppResult<AppliedOverrides> {
        let Some(record) = self.repository.find_override(user_id, retreat_id).await? else {
            return Ok(AppliedOverrides {
                permissions: base,
                next_expiry: None,
            });
        };

        let now = Utc::now();
        let permissions = if allow_grants {
            record.apply_to(base, now)
        } else {
            apply_override_denials(base, &record.entries, now)
        };

        Ok(AppliedOverrides {
            permissions,
            next_expiry: record.next_expiry_after(now),
        })
    }
}

#[cfg(test)]
mod tests;
