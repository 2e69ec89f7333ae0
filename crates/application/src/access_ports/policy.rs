use async_trait::async_trait;

use retreat_access_core::AppResult;
use retreat_access_domain::{DelegationRule, InheritanceRule};

/// Repository port for the role inheritance graph.
#[async_trait]
pub trait InheritanceRuleRepository: Send + Sync {
    /// Lists every rule.
    async fn list_inheritance_rules(&self) -> AppResult<Vec<InheritanceRule>>;

    /// Lists rules whose parent is the given role.
    async fn list_rules_for_parent(&self, parent_role: &str) -> AppResult<Vec<InheritanceRule>>;

    /// Adds a rule. Fails with a conflict when the edge already exists.
    async fn add_inheritance_rule(&self, rule: InheritanceRule) -> AppResult<()>;

    /// Removes the rule for an edge. Returns whether one existed.
    async fn remove_inheritance_rule(&self, parent_role: &str, child_role: &str)
    -> AppResult<bool>;
}

/// Repository port for static delegation policy.
#[async_trait]
pub trait DelegationRuleRepository: Send + Sync {
    /// Lists every rule.
    async fn list_delegation_rules(&self) -> AppResult<Vec<DelegationRule>>;

    /// Finds the rule for a (from role, to role) pair.
    async fn find_delegation_rule(
        &self,
        from_role: &str,
        to_role: &str,
    ) -> AppResult<Option<DelegationRule>>;

    /// Adds a rule. Fails with a conflict when the pair already has one.
    async fn add_delegation_rule(&self, rule: DelegationRule) -> AppResult<()>;

    /// Removes the rule for a pair. Returns whether one existed.
    async fn remove_delegation_rule(&self, from_role: &str, to_role: &str) -> AppResult<bool>;
}
