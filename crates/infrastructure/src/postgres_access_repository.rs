use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use retreat_access_application::{
    MembershipRepository, RetreatRecord, RetreatRepository, RoleRepository,
};
use retreat_access_core::{AppError, AppResult, RetreatId, UserId};
use retreat_access_domain::{MembershipStatus, PermissionKey, RetreatMembership, Role, RoleId};

mod memberships;
mod roles;


/// PostgreSQL-backed repository for roles, global role assignments,
/// retreat memberships and retreat ownership.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
}

impl PostgresAccessRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    name: String,
    description: String,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    resource: String,
    operation: String,
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    user_id: uuid::Uuid,
    retreat_id: uuid::Uuid,
    role_id: uuid::Uuid,
    status: String,
    invited_by: Option<uuid::Uuid>,
    invited_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct RetreatRow {
    id: uuid::Uuid,
    name: String,
    created_by: uuid::Uuid,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Role::new(RoleId::from_uuid(row.id), row.name, row.description)
    }
}

impl TryFrom<PermissionRow> for PermissionKey {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        PermissionKey::new(row.resource, row.operation)
    }
}

impl TryFrom<MembershipRow> for RetreatMembership {
    type Error = AppError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(RetreatMembership {
            user_id: UserId::from_uuid(row.user_id),
            retreat_id: RetreatId::from_uuid(row.retreat_id),
            role_id: RoleId::from_uuid(row.role_id),
            status: MembershipStatus::parse(row.status.as_str())?,
            invited_by: row.invited_by.map(UserId::from_uuid),
            invited_at: row.invited_at,
            expires_at: row.expires_at,
        })
    }
}

fn role_ids_as_uuids(role_ids: &[RoleId]) -> Vec<uuid::Uuid> {
    role_ids.iter().map(RoleId::as_uuid).collect()
}

fn map_write_error(error: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23503") => {
                return AppError::NotFound(format!(
                    "failed to {context}: referenced retreat or role does not exist"
                ));
            }
            Some("23505") => return AppError::Conflict(format!("failed to {context}: duplicate row")),
            _ => {}
        }
    }

    AppError::Internal(format!("failed to {context}: {error}"))
}

#[async_trait]
impl RoleRepository for PostgresAccessRepository {
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.find_role_by_name_impl(name).await
    }

    async fn list_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        self.list_roles_by_ids_impl(role_ids).await
    }

    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<PermissionKey>> {
        self.list_permissions_for_roles_impl(role_ids).await
    }

    async fn list_global_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        self.list_global_roles_for_user_impl(user_id).await
    }

    async fn assign_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        self.assign_global_role_impl(user_id, role_id).await
    }

    async fn remove_global_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        self.remove_global_role_impl(user_id, role_id).await
    }
}

#[async_trait]
impl MembershipRepository for PostgresAccessRepository {
    async fn list_live_memberships_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_live_memberships_for_user_impl(user_id).await
    }

    async fn list_active_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_memberships_for_retreat_impl(retreat_id, Some(MembershipStatus::Active))
            .await
    }

    async fn list_memberships_for_retreat(
        &self,
        retreat_id: RetreatId,
    ) -> AppResult<Vec<RetreatMembership>> {
        self.list_memberships_for_retreat_impl(retreat_id, None)
            .await
    }

    async fn find_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
    ) -> AppResult<Option<RetreatMembership>> {
        self.find_membership_impl(user_id, retreat_id, role_id)
            .await
    }

    async fn upsert_membership(&self, membership: RetreatMembership) -> AppResult<()> {
        self.upsert_membership_impl(membership).await
    }

    async fn transition_membership(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool> {
        self.transition_membership_impl(user_id, retreat_id, role_id, from, to)
            .await
    }

    async fn expire_memberships(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.expire_memberships_impl(now).await
    }
}

#[async_trait]
impl RetreatRepository for PostgresAccessRepository {
    async fn find_retreat(&self, retreat_id: RetreatId) -> AppResult<Option<RetreatRecord>> {
        let row = sqlx::query_as::<_, RetreatRow>(
            r#"
            SELECT id, name, created_by
            FROM retreats
            WHERE id = $1
            "#,
        )
        .bind(retreat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find retreat: {error}")))?;

        Ok(row.map(|row| RetreatRecord {
            retreat_id: RetreatId::from_uuid(row.id),
            name: row.name,
            created_by: UserId::from_uuid(row.created_by),
        }))
    }
}
