use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use retreat_access_core::{AppError, AppResult, AuditContext, RetreatId, UserId};
use retreat_access_domain::{
    AuditAction, Delegation, DelegationId, DelegationRule, DelegationStatus, PermissionKey,
};
use serde::Serialize;
use tracing::info;

use crate::audit_trail::AuditTrail;
use crate::{
    AuditEvent, CacheStore, DelegationRepository, DelegationRuleRepository, InheritanceEngine,
    ResolvedAccess, RetreatAuthority, RolePermissionResolver,
};

/// Outcome of a delegation policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelegationCheck {
    /// Whether every requested permission may be delegated.
    pub can_delegate: bool,
    /// Whether the matching rule demands approval.
    pub requires_approval: bool,
    /// Longest allowed duration in hours; zero when no rule matched.
    pub max_duration_hours: u32,
}

impl DelegationCheck {
    fn denied() -> Self {
        Self {
            can_delegate: false,
            requires_approval: false,
            max_duration_hours: 0,
        }
    }
}

/// Input payload for creating a delegation. The delegator is the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDelegationInput {
    /// Receiving user.
    pub to_user: UserId,
    /// Retreat scope.
    pub retreat_id: RetreatId,
    /// Permissions to lend.
    pub permissions: Vec<PermissionKey>,
    /// Requested duration; the rule maximum when absent.
    pub duration_hours: Option<u32>,
}

/// Delegated permissions held by one user in one retreat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegatedPermissions {
    /// Union of every active grant.
    pub permissions: BTreeSet<PermissionKey>,
    /// Earliest expiry among the contributing grants.
    pub earliest_expiry: Option<DateTime<Utc>>,
}

/// Rule-constrained, time-bounded permission lending between users.
#[derive(Clone)]
pub struct DelegationService {
    resolver: RolePermissionResolver,
    inheritance: InheritanceEngine,
    authority: RetreatAuthority,
    repository: Arc<dyn DelegationRepository>,
    rules: Arc<dyn DelegationRuleRepository>,
    cache: CacheStore,
    audit: AuditTrail,
}

impl DelegationService {
    /// Creates a delegation service.
    #[must_use]
    pub(crate) fn new(
        resolver: RolePermissionResolver,
        inheritance: InheritanceEngine,
        authority: RetreatAuthority,
        repository: Arc<dyn DelegationRepository>,
        rules: Arc<dyn DelegationRuleRepository>,
        cache: CacheStore,
        audit: AuditTrail,
    ) -> Self {
        Self {
            resolver,
            inheritance,
            authority,
            repository,
            rules,
            cache,
            audit,
        }
    }

    /// Checks whether `from_user` may lend `permissions` to `to_user` in the
    /// retreat under the static delegation rules.
    pub async fn can_delegate(
        &self,
        from_user: UserId,
        to_user: UserId,
        retreat_id: RetreatId,
        permissions: &[PermissionKey],
    ) -> AppResult<DelegationCheck> {
        let rules = self.matching_rules(from_user, to_user, retreat_id).await?;
        let Some(rule) = select_rule(&rules, permissions) else {
            return Ok(DelegationCheck::denied());
        };

        Ok(DelegationCheck {
            can_delegate: !permissions.is_empty() && rule.allows_all(permissions),
            requires_approval: rule.requires_approval(),
            max_duration_hours: rule.max_duration_hours(),
        })
    }

    /// Creates an active delegation after re-validating it against policy.
    pub async fn create_delegation(
        &self,
        actor: &AuditContext,
        input: CreateDelegationInput,
    ) -> AppResult<Delegation> {
        let from_user = actor.actor();
        if input.permissions.is_empty() {
            return Err(AppError::Validation(
                "delegation must include at least one permission".to_owned(),
            ));
        }

        if from_user == input.to_user {
            return Err(AppError::Validation(
                "users cannot delegate permissions to themselves".to_owned(),
            ));
        }

        let rules = self
            .matching_rules(from_user, input.to_user, input.retreat_id)
            .await?;
        let rule = select_rule(&rules, &input.permissions)
            .cloned()
            .ok_or_else(|| {
                AppError::PolicyViolation(format!(
                    "no delegation rule allows user '{from_user}' to delegate to user '{}' in retreat '{}'",
                    input.to_user, input.retreat_id
                ))
            })?;

        let disallowed: Vec<String> = input
            .permissions
            .iter()
            .filter(|permission| !rule.permissions().contains(*permission))
            .map(ToString::to_string)
            .collect();
        if !disallowed.is_empty() {
            return Err(AppError::PolicyViolation(format!(
                "delegation rule '{}' -> '{}' does not allow: {}",
                rule.from_role(),
                rule.to_role(),
                disallowed.join(", ")
            )));
        }

        if rule.requires_approval() {
            return Err(AppError::PolicyViolation(format!(
                "delegation rule '{}' -> '{}' requires approval",
                rule.from_role(),
                rule.to_role()
            )));
        }

        let duration_hours = input.duration_hours.unwrap_or(rule.max_duration_hours());
        if duration_hours == 0 {
            return Err(AppError::PolicyViolation(
                "delegation duration must be greater than zero hours".to_owned(),
            ));
        }

        if duration_hours > rule.max_duration_hours() {
            return Err(AppError::PolicyViolation(format!(
                "delegation duration {duration_hours}h exceeds the {}h maximum",
                rule.max_duration_hours()
            )));
        }

        let now = Utc::now();
        let delegation = Delegation {
            delegation_id: DelegationId::new(),
            from_user,
            to_user: input.to_user,
            retreat_id: input.retreat_id,
            permissions: input.permissions.into_iter().collect(),
            status: DelegationStatus::Active,
            created_at: now,
            expires_at: now + Duration::hours(i64::from(duration_hours)),
            revoked_at: None,
            revoked_by: None,
        };

        self.repository.insert_delegation(delegation.clone()).await?;
        self.cache
            .invalidate_grants(delegation.to_user, delegation.retreat_id)
            .await;

        let permission_list = join_permissions(&delegation.permissions);
        info!(
            delegation_id = %delegation.delegation_id,
            retreat_id = %delegation.retreat_id,
            from_user = %delegation.from_user,
            to_user = %delegation.to_user,
            duration_hours,
            "delegation created"
        );
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::DelegationCreated,
                    "delegation",
                    delegation.delegation_id.to_string(),
                )
                .in_retreat(delegation.retreat_id)
                .by(actor)
                .with_detail(format!(
                    "delegated [{permission_list}] to '{}' until '{}'",
                    delegation.to_user,
                    delegation.expires_at.to_rfc3339()
                )),
            )
            .await;

        Ok(delegation)
    }

    /// Lists in-force delegations where the user is either party.
    pub async fn get_active_delegations(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
    ) -> AppResult<Vec<Delegation>> {
        let now = Utc::now();
        Ok(self
            .repository
            .list_active_delegations_for_user(user_id, retreat_id, now)
            .await?
            .into_iter()
            .filter(|delegation| delegation.is_active_at(now) && delegation.involves(user_id))
            .collect())
    }

    /// Lists every delegation in a retreat. Managers only.
    pub async fn list_retreat_delegations(
        &self,
        actor: &AuditContext,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>> {
        self.authority
            .require_retreat_manager(actor.actor(), retreat_id)
            .await?;

        self.repository.list_delegations_for_retreat(retreat_id).await
    }

    /// Revokes an active delegation. Returns `false` when it is absent or no
    /// longer in force.
    pub async fn revoke(&self, actor: &AuditContext, delegation_id: DelegationId) -> AppResult<bool> {
        let revoked_by = actor.actor();
        let now = Utc::now();
        let Some(delegation) = self.repository.find_delegation(delegation_id).await? else {
            return Ok(false);
        };

        if !delegation.is_active_at(now) {
            return Ok(false);
        }

        if !delegation.involves(revoked_by)
            && !self
                .authority
                .is_retreat_manager(revoked_by, delegation.retreat_id)
                .await?
        {
            return Err(AppError::Forbidden(format!(
                "user '{revoked_by}' may not revoke delegation '{delegation_id}'"
            )));
        }

        if !self
            .repository
            .revoke_delegation(delegation_id, revoked_by, now)
            .await?
        {
            return Ok(false);
        }

        self.cache
            .invalidate_grants(delegation.to_user, delegation.retreat_id)
            .await;

        info!(
            delegation_id = %delegation_id,
            retreat_id = %delegation.retreat_id,
            revoked_by = %revoked_by,
            "delegation revoked"
        );
        self.audit
            .record(
                AuditEvent::new(
                    AuditAction::DelegationRevoked,
                    "delegation",
                    delegation_id.to_string(),
                )
                .in_retreat(delegation.retreat_id)
                .by(actor)
                .with_detail(format!("revoked delegation to '{}'", delegation.to_user)),
            )
            .await;

        Ok(true)
    }

    /// Marks every lapsed active delegation as expired. Returns the count.
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let expired = self.repository.expire_delegations(Utc::now()).await?;
        if expired == 0 {
            return Ok(0);
        }

        self.cache.invalidate_all_grants().await;
        info!(expired, "expired lapsed delegations");
        self.audit
            .record(
                AuditEvent::new(AuditAction::DelegationsExpired, "delegation", "*")
                    .with_detail(format!("expired {expired} delegations")),
            )
            .await;

        Ok(expired)
    }

    /// Returns permissions delegated to the user in the retreat.
    pub async fn delegated_permissions(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<DelegatedPermissions> {
        let mut delegated = DelegatedPermissions::default();
        for delegation in self
            .get_active_delegations(user_id, Some(retreat_id))
            .await?
            .into_iter()
            .filter(|delegation| delegation.to_user == user_id && delegation.retreat_id == retreat_id)
        {
            delegated.earliest_expiry = Some(
                delegated
                    .earliest_expiry
                    .map_or(delegation.expires_at, |current| current.min(delegation.expires_at)),
            );
            delegated.permissions.extend(delegation.permissions);
        }

        Ok(delegated)
    }

    /// Returns every rule linking a role the delegator can delegate from to
    /// a role the delegate holds, in resolution order: delegator roles in
    /// resolver order, each followed by its `inherit_delegation` walk, then
    /// delegate roles in resolver order.
    async fn matching_rules(
        &self,
        from_user: UserId,
        to_user: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<DelegationRule>> {
        let from_resolved = self.resolver.resolve(from_user, Some(retreat_id)).await?;
        let to_resolved = self.resolver.resolve(to_user, Some(retreat_id)).await?;
        let from_roles = ordered_retreat_roles(&from_resolved);
        let to_roles = ordered_retreat_roles(&to_resolved);
        if from_roles.is_empty() || to_roles.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<String> = Vec::new();
        for from_role in &from_roles {
            for candidate in self.inheritance.delegation_roles(from_role, retreat_id).await? {
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        let mut rules = Vec::new();
        for candidate in &candidates {
            for to_role in &to_roles {
                if let Some(rule) = self.rules.find_delegation_rule(candidate, to_role).await? {
                    rules.push(rule);
                }
            }
        }

        Ok(rules)
    }
}

/// Representative role first, then the remaining retreat roles by name.
fn ordered_retreat_roles(resolved: &ResolvedAccess) -> Vec<String> {
    let mut roles: Vec<String> = resolved.retreat_specific_role.iter().cloned().collect();
    roles.extend(
        resolved
            .retreat_roles
            .iter()
            .filter(|role| resolved.retreat_specific_role.as_ref() != Some(*role))
            .cloned(),
    );
    roles
}

/// The first rule allowing every requested permission, else the first rule.
fn select_rule<'a>(
    rules: &'a [DelegationRule],
    permissions: &[PermissionKey],
) -> Option<&'a DelegationRule> {
    rules
        .iter()
        .find(|rule| !permissions.is_empty() && rule.allows_all(permissions))
        .or_else(|| rules.first())
}

fn join_permissions(permissions: &BTreeSet<PermissionKey>) -> String {
    permissions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests;
