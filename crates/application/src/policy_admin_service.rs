use std::sync::Arc;

use retreat_access_core::{AppResult, AuditContext};
use retreat_access_domain::{AuditAction, DelegationRule, InheritanceRule};
use tracing::info;

use crate::audit_trail::AuditTrail;
use crate::{
    AuditEvent, CacheStore, DelegationRuleRepository, InheritanceRuleRepository, RetreatAuthority,
};

/// Administrative CRUD over the inheritance graph and delegation policy.
///
/// Every operation requires the global `system:admin` permission.
#[derive(Clone)]
pub struct PolicyAdminService {
    authority: RetreatAuthority,
    inheritance_rules: Arc<dyn InheritanceRuleRepository>,
    delegation_rules: Arc<dyn DelegationRuleRepository>,
    cache: CacheStore,
    audit: AuditTrail,
}

impl PolicyAdminService {
    pub(crate) fn new(
        authority: RetreatAuthority,
        inheritance_rules: Arc<dyn InheritanceRuleRepository>,
        delegation_rules: Arc<dyn DelegationRuleRepository>,
        cache: CacheStore,
        audit: AuditTrail,
    ) -> Self {
        Self {
            authority,
            inheritance_rules,
            delegation_rules,
            cache,
            audit,
        }
    }

    /// Lists inheritance rules.
    pub async fn list_inheritance_rules(
        &self,
        actor: &AuditContext,
    ) -> AppResult<Vec<InheritanceRule>> {
        self.authority.require_system_admin(actor.actor()).await?;
        self.inheritance_rules.list_inheritance_rules().await
    }

    /// Adds an inheritance edge.
    pub async fn add_inheritance_rule(
        &self,
        actor: &AuditContext,
        rule: InheritanceRule,
    ) -> AppResult<()> {
        self.authority.require_system_admin(actor.actor()).await?;

        let edge = format!("{}->{}", rule.parent_role(), rule.child_role());
        self.inheritance_rules.add_inheritance_rule(rule).await?;
        self.cache.invalidate_role_hierarchy().await;

        info!(edge = %edge, "inheritance rule added");
        self.audit
            .record(
                AuditEvent::new(AuditAction::InheritanceRuleAdded, "inheritance_rule", edge)
                    .by(actor),
            )
            .await;

        Ok(())
    }

    /// Removes an inheritance edge. Returns whether it existed.
    pub async fn remove_inheritance_rule(
        &self,
        actor: &AuditContext,
        parent_role: &str,
        child_role: &str,
    ) -> AppResult<bool> {
        self.authority.require_system_admin(actor.actor()).await?;

        let removed = self
            .inheritance_rules
            .remove_inheritance_rule(parent_role, child_role)
            .await?;
        if !removed {
            return Ok(false);
        }

        self.cache.invalidate_role_hierarchy().await;
        let edge = format!("{parent_role}->{child_role}");
        info!(edge = %edge, "inheritance rule removed");
        self.audit
            .record(
                AuditEvent::new(AuditAction::InheritanceRuleRemoved, "inheritance_rule", edge)
                    .by(actor),
            )
            .await;

        Ok(true)
    }

    /// Lists delegation rules.
    pub async fn list_delegation_rules(
        &self,
        actor: &AuditContext,
    ) -> AppResult<Vec<DelegationRule>> {
        self.authority.require_system_admin(actor.actor()).await?;
        self.delegation_rules.list_delegation_rules().await
    }

    /// Adds a delegation rule.
    pub async fn add_delegation_rule(
        &self,
        actor: &AuditContext,
        rule: DelegationRule,
    ) -> AppResult<()> {
        self.authority.require_system_admin(actor.actor()).await?;

        let pair = format!("{}->{}", rule.from_role(), rule.to_role());
        let detail = format!(
            "max {}h, approval required: {}",
            rule.max_duration_hours(),
            rule.requires_approval()
        );
        self.delegation_rules.add_delegation_rule(rule).await?;

        info!(pair = %pair, "delegation rule added");
        self.audit
            .record(
                AuditEvent::new(AuditAction::DelegationRuleAdded, "delegation_rule", pair)
                    .by(actor)
                    .with_detail(detail),
            )
            .await;

        Ok(())
    }

    /// Removes a delegation rule. Existing delegations stay in force until
    /// they expire or are revoked. Returns whether the rule existed.
    pub async fn remove_delegation_rule(
        &self,
        actor: &AuditContext,
        from_role: &str,
        to_role: &str,
    ) -> AppResult<bool> {
        self.authority.require_system_admin(actor.actor()).await?;

        let removed = self
            .delegation_rules
            .remove_delegation_rule(from_role, to_role)
            .await?;
        if !removed {
            return Ok(false);
        }

        let pair = format!("{from_role}->{to_role}");
        info!(pair = %pair, "delegation rule removed");
        self.audit
            .record(
                AuditEvent::new(AuditAction::DelegationRuleRemoved, "delegation_rule", pair)
                    .by(actor),
            )
            .await;

        Ok(true)
    }
}
