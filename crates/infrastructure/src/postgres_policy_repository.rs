use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use retreat_access_application::{DelegationRuleRepository, InheritanceRuleRepository};
use retreat_access_core::{AppError, AppResult};
use retreat_access_domain::{
    DelegationRule, InheritanceCondition, InheritanceRule, PermissionKey,
};

/// PostgreSQL-backed repository for the role inheritance graph and the
/// static delegation policy.
#[derive(Clone)]
pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct InheritanceRuleRow {
    parent_role: String,
    child_role: String,
    inherit_permissions: bool,
    inherit_delegation: bool,
    conditions: Json<Vec<InheritanceCondition>>,
}

#[derive(Debug, FromRow)]
struct DelegationRuleRow {
    from_role: String,
    to_role: String,
    permissions: Vec<String>,
    max_duration_hours: i32,
    requires_approval: bool,
}

impl TryFrom<InheritanceRuleRow> for InheritanceRule {
    type Error = AppError;

    fn try_from(row: InheritanceRuleRow) -> Result<Self, Self::Error> {
        InheritanceRule::new(
            row.parent_role,
            row.child_role,
            row.inherit_permissions,
            row.inherit_delegation,
            row.conditions.0,
        )
    }
}

impl TryFrom<DelegationRuleRow> for DelegationRule {
    type Error = AppError;

    fn try_from(row: DelegationRuleRow) -> Result<Self, Self::Error> {
        let permissions = row
            .permissions
            .iter()
            .map(|value| PermissionKey::parse(value))
            .collect::<AppResult<Vec<_>>>()?;
        let max_duration_hours = u32::try_from(row.max_duration_hours).map_err(|_| {
            AppError::Internal(format!(
                "delegation rule '{}' -> '{}' has a negative max duration",
                row.from_role, row.to_role
            ))
        })?;

        DelegationRule::new(
            row.from_role,
            row.to_role,
            permissions,
            max_duration_hours,
            row.requires_approval,
        )
    }
}

fn map_rule_conflict(error: sqlx::Error, edge: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("rule '{edge}' already exists"));
    }

    AppError::Internal(format!("failed to add rule '{edge}': {error}"))
}

#[async_trait]
impl InheritanceRuleRepository for PostgresPolicyRepository {
    async fn list_inheritance_rules(&self) -> AppResult<Vec<InheritanceRule>> {
        sqlx::query_as::<_, InheritanceRuleRow>(
            r#"
            SELECT parent_role, child_role, inherit_permissions, inherit_delegation, conditions
            FROM inheritance_rules
            ORDER BY parent_role, child_role
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list inheritance rules: {error}"))
        })?
        .into_iter()
        .map(InheritanceRule::try_from)
        .collect()
    }

    async fn list_rules_for_parent(&self, parent_role: &str) -> AppResult<Vec<InheritanceRule>> {
        sqlx::query_as::<_, InheritanceRuleRow>(
            r#"
            SELECT parent_role, child_role, inherit_permissions, inherit_delegation, conditions
            FROM inheritance_rules
            WHERE parent_role = $1
            ORDER BY child_role
            "#,
        )
        .bind(parent_role)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list inheritance rules: {error}"))
        })?
        .into_iter()
        .map(InheritanceRule::try_from)
        .collect()
    }

    async fn add_inheritance_rule(&self, rule: InheritanceRule) -> AppResult<()> {
        let edge = format!("{}->{}", rule.parent_role(), rule.child_role());
        sqlx::query(
            r#"
            INSERT INTO inheritance_rules (
                parent_role,
                child_role,
                inherit_permissions,
                inherit_delegation,
                conditions
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(rule.parent_role())
        .bind(rule.child_role())
        .bind(rule.inherit_permissions())
        .bind(rule.inherit_delegation())
        .bind(Json(rule.conditions()))
        .execute(&self.pool)
        .await
        .map_err(|error| map_rule_conflict(error, edge.as_str()))?;

        Ok(())
    }

    async fn remove_inheritance_rule(
        &self,
        parent_role: &str,
        child_role: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM inheritance_rules
            WHERE parent_role = $1 AND child_role = $2
            "#,
        )
        .bind(parent_role)
        .bind(child_role)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove inheritance rule: {error}"))
        })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DelegationRuleRepository for PostgresPolicyRepository {
    async fn list_delegation_rules(&self) -> AppResult<Vec<DelegationRule>> {
        sqlx::query_as::<_, DelegationRuleRow>(
            r#"
            SELECT from_role, to_role, permissions, max_duration_hours, requires_approval
            FROM delegation_rules
            ORDER BY from_role, to_role
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list delegation rules: {error}")))?
        .into_iter()
        .map(DelegationRule::try_from)
        .collect()
    }

    async fn find_delegation_rule(
        &self,
        from_role: &str,
        to_role: &str,
    ) -> AppResult<Option<DelegationRule>> {
        sqlx::query_as::<_, DelegationRuleRow>(
            r#"
            SELECT from_role, to_role, permissions, max_duration_hours, requires_approval
            FROM delegation_rules
            WHERE from_role = $1 AND to_role = $2
            "#,
        )
        .bind(from_role)
        .bind(to_role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find delegation rule: {error}")))?
        .map(DelegationRule::try_from)
        .transpose()
    }

    async fn add_delegation_rule(&self, rule: DelegationRule) -> AppResult<()> {
        let edge = format!("{}->{}", rule.from_role(), rule.to_role());
        let permissions: Vec<String> = rule.permissions().iter().map(ToString::to_string).collect();
        let max_duration_hours = i32::try_from(rule.max_duration_hours()).map_err(|_| {
            AppError::Validation(format!(
                "delegation rule '{edge}' max_duration_hours is out of range"
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO delegation_rules (
                from_role,
                to_role,
                permissions,
                max_duration_hours,
                requires_approval
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(rule.from_role())
        .bind(rule.to_role())
        .bind(permissions)
        .bind(max_duration_hours)
        .bind(rule.requires_approval())
        .execute(&self.pool)
        .await
        .map_err(|error| map_rule_conflict(error, edge.as_str()))?;

        Ok(())
    }

    async fn remove_delegation_rule(&self, from_role: &str, to_role: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM delegation_rules
            WHERE from_role = $1 AND to_role = $2
            "#,
        )
        .bind(from_role)
        .bind(to_role)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove delegation rule: {error}"))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
