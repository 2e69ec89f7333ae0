use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use retreat_access_application::DelegationRepository;
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use retreat_access_domain::{Delegation, DelegationId, DelegationStatus, PermissionKey};

/// PostgreSQL-backed repository for runtime delegation grants.
#[derive(Clone)]
pub struct PostgresDelegationRepository {
    pool: PgPool,
}

impl PostgresDelegationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DelegationRow {
    id: uuid::Uuid,
    from_user: uuid::Uuid,
    to_user: uuid::Uuid,
    retreat_id: uuid::Uuid,
    permissions: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<uuid::Uuid>,
}

impl TryFrom<DelegationRow> for Delegation {
    type Error = AppError;

    fn try_from(row: DelegationRow) -> Result<Self, Self::Error> {
        let permissions: BTreeSet<PermissionKey> = row
            .permissions
            .iter()
            .map(|value| PermissionKey::parse(value))
            .collect::<AppResult<_>>()?;

        Ok(Delegation {
            delegation_id: DelegationId::from_uuid(row.id),
            from_user: UserId::from_uuid(row.from_user),
            to_user: UserId::from_uuid(row.to_user),
            retreat_id: RetreatId::from_uuid(row.retreat_id),
            permissions,
            status: DelegationStatus::parse(row.status.as_str())?,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by.map(UserId::from_uuid),
        })
    }
}

#[async_trait]
impl DelegationRepository for PostgresDelegationRepository {
    async fn insert_delegation(&self, delegation: Delegation) -> AppResult<()> {
        let permissions: Vec<String> = delegation
            .permissions
            .iter()
            .map(ToString::to_string)
            .collect();

        sqlx::query(
            r#"
            INSERT INTO delegations (
                id,
                from_user,
                to_user,
                retreat_id,
                permissions,
                status,
                created_at,
                expires_at,
                revoked_at,
                revoked_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(delegation.delegation_id.as_uuid())
        .bind(delegation.from_user.as_uuid())
        .bind(delegation.to_user.as_uuid())
        .bind(delegation.retreat_id.as_uuid())
        .bind(permissions)
        .bind(delegation.status.as_str())
        .bind(delegation.created_at)
        .bind(delegation.expires_at)
        .bind(delegation.revoked_at)
        .bind(delegation.revoked_by.map(|user_id| user_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error {
                match database_error.code().as_deref() {
                    Some("23503") => {
                        return AppError::NotFound(format!(
                            "retreat '{}' does not exist",
                            delegation.retreat_id
                        ));
                    }
                    Some("23505") => {
                        return AppError::Conflict(format!(
                            "delegation '{}' already exists",
                            delegation.delegation_id
                        ));
                    }
                    _ => {}
                }
            }

            AppError::Internal(format!("failed to insert delegation: {error}"))
        })?;

        Ok(())
    }

    async fn find_delegation(&self, delegation_id: DelegationId) -> AppResult<Option<Delegation>> {
        sqlx::query_as::<_, DelegationRow>(
            r#"
            SELECT id, from_user, to_user, retreat_id, permissions, status,
                created_at, expires_at, revoked_at, revoked_by
            FROM delegations
            WHERE id = $1
            "#,
        )
        .bind(delegation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find delegation: {error}")))?
        .map(Delegation::try_from)
        .transpose()
    }

    async fn list_active_delegations_for_user(
        &self,
        user_id: UserId,
        retreat_id: Option<RetreatId>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Delegation>> {
        sqlx::query_as::<_, DelegationRow>(
            r#"
            SELECT id, from_user, to_user, retreat_id, permissions, status,
                created_at, expires_at, revoked_at, revoked_by
            FROM delegations
            WHERE (from_user = $1 OR to_user = $1)
                AND ($2::UUID IS NULL OR retreat_id = $2)
                AND status = 'active'
                AND expires_at > $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.map(|retreat_id| retreat_id.as_uuid()))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list active delegations: {error}"))
        })?
        .into_iter()
        .map(Delegation::try_from)
        .collect()
    }

    async fn list_delegations_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<Delegation>> {
        sqlx::query_as::<_, DelegationRow>(
            r#"
            SELECT id, from_user, to_user, retreat_id, permissions, status,
                created_at, expires_at, revoked_at, revoked_by
            FROM delegations
            WHERE retreat_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(retreat_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list retreat delegations: {error}"))
        })?
        .into_iter()
        .map(Delegation::try_from)
        .collect()
    }

    async fn revoke_delegation(
        &self,
        delegation_id: DelegationId,
        revoked_by: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE delegations
            SET status = 'revoked',
                revoked_at = $3,
                revoked_by = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(delegation_id.as_uuid())
        .bind(revoked_by.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke delegation: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire_delegations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE delegations
            SET status = 'expired'
            WHERE status = 'active' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire delegations: {error}")))?;

        Ok(result.rows_affected())
    }
}
