use super::*;

impl InMemoryAccessStore {
    pub(super) async fn list_inheritance_rules_impl(&self) -> AppResult<Vec<InheritanceRule>> {
        let mut rules = self.inheritance_rules.read().await.clone();
        rules.sort_by(|left, right| {
            (left.parent_role(), left.child_role()).cmp(&(right.parent_role(), right.child_role()))
        });
        Ok(rules)
    }

    pub(super) async fn add_inheritance_rule_impl(&self, rule: InheritanceRule) -> AppResult<()> {
        let mut rules = self.inheritance_rules.write().await;
        if rules
            .iter()
            .any(|existing| existing.same_edge(rule.parent_role(), rule.child_role()))
        {
            return Err(AppError::Conflict(format!(
                "inheritance rule '{}' -> '{}' already exists",
                rule.parent_role(),
                rule.child_role()
            )));
        }

        rules.push(rule);
        Ok(())
    }

    pub(super) async fn list_delegation_rules_impl(&self) -> AppResult<Vec<DelegationRule>> {
        let mut rules = self.delegation_rules.read().await.clone();
        rules.sort_by(|left, right| {
            (left.from_role(), left.to_role()).cmp(&(right.from_role(), right.to_role()))
        });
        Ok(rules)
    }

    pub(super) async fn add_delegation_rule_impl(&self, rule: DelegationRule) -> AppResult<()> {
        let mut rules = self.delegation_rules.write().await;
        if rules
            .iter()
            .any(|existing| existing.same_edge(rule.from_role(), rule.to_role()))
        {
            return Err(AppError::Conflict(format!(
                "delegation rule '{}' -> '{}' already exists",
                rule.from_role(),
                rule.to_role()
            )));
        }

        rules.push(rule);
        Ok(())
    }
}
