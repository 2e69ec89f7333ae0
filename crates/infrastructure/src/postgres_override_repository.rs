use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use retreat_access_application::OverrideRepository;
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use retreat_access_domain::{OverrideEntry, PermissionKey, PermissionOverride};

/// PostgreSQL-backed repository for per-user permission overrides.
///
/// Entries live in their own table with an explicit `position` so the
/// stored order survives round trips.
#[derive(Clone)]
pub struct PostgresOverrideRepository {
    pool: PgPool,
}

impl PostgresOverrideRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OverrideRow {
    reason: String,
    set_by: uuid::Uuid,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OverrideEntryRow {
    resource: String,
    operation: String,
    granted: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl OverrideRepository for PostgresOverrideRepository {
    async fn find_override(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
    ) -> AppResult<Option<PermissionOverride>> {
        let Some(header) = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT reason, set_by, updated_at
            FROM permission_overrides
            WHERE user_id = $1 AND retreat_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find override: {error}")))?
        else {
            return Ok(None);
        };

        let entries = sqlx::query_as::<_, OverrideEntryRow>(
            r#"
            SELECT resource, operation, granted, expires_at
            FROM permission_override_entries
            WHERE user_id = $1 AND retreat_id = $2
            ORDER BY position
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list override entries: {error}")))?
        .into_iter()
        .map(|row| {
            Ok(OverrideEntry {
                permission: PermissionKey::new(row.resource, row.operation)?,
                granted: row.granted,
                expires_at: row.expires_at,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

        Ok(Some(PermissionOverride {
            user_id,
            retreat_id,
            entries,
            reason: header.reason,
            set_by: UserId::from_uuid(header.set_by),
            updated_at: header.updated_at,
        }))
    }

    async fn save_override(&self, record: PermissionOverride) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        sqlx::query(
            r#"
            INSERT INTO permission_overrides (user_id, retreat_id, reason, set_by, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, retreat_id) DO UPDATE
            SET reason = EXCLUDED.reason,
                set_by = EXCLUDED.set_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(record.retreat_id.as_uuid())
        .bind(record.reason.as_str())
        .bind(record.set_by.as_uuid())
        .bind(record.updated_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23503")
            {
                return AppError::NotFound(format!(
                    "retreat '{}' does not exist",
                    record.retreat_id
                ));
            }

            AppError::Internal(format!("failed to save override: {error}"))
        })?;

        sqlx::query(
            r#"
            DELETE FROM permission_override_entries
            WHERE user_id = $1 AND retreat_id = $2
            "#,
        )
        .bind(record.user_id.as_uuid())
        .bind(record.retreat_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to replace override entries: {error}"))
        })?;

        for (position, entry) in record.entries.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                AppError::Validation("override lists are limited to i32::MAX entries".to_owned())
            })?;

            sqlx::query(
                r#"
                INSERT INTO permission_override_entries (
                    user_id,
                    retreat_id,
                    position,
                    resource,
                    operation,
                    granted,
                    expires_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(record.user_id.as_uuid())
            .bind(record.retreat_id.as_uuid())
            .bind(position)
            .bind(entry.permission.resource())
            .bind(entry.permission.operation())
            .bind(entry.granted)
            .bind(entry.expires_at)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist override entry: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    async fn delete_override(&self, user_id: UserId, retreat_id: RetreatId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_overrides
            WHERE user_id = $1 AND retreat_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete override: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
