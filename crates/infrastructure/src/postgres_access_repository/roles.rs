use super::*;

impl PostgresAccessRepository {
    pub(super) async fn find_role_by_name_impl(&self, name: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description
            FROM roles
            WHERE name = $1
            LIMIT 1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    pub(super) async fn list_roles_by_ids_impl(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description
            FROM roles
            WHERE id = ANY($1)
            ORDER BY name
            "#,
        )
        .bind(role_ids_as_uuids(role_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?
        .into_iter()
        .map(Role::try_from)
        .collect()
    }

    pub(super) async fn list_permissions_for_roles_impl(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<PermissionKey>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT DISTINCT permissions.resource, permissions.operation
            FROM role_permissions
            INNER JOIN permissions
                ON permissions.id = role_permissions.permission_id
            WHERE role_permissions.role_id = ANY($1)
            ORDER BY permissions.resource, permissions.operation
            "#,
        )
        .bind(role_ids_as_uuids(role_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list role permissions: {error}"))
        })?
        .into_iter()
        .map(PermissionKey::try_from)
        .collect()
    }

    pub(super) async fn list_global_roles_for_user_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT roles.id, roles.name, roles.description
            FROM user_roles
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
            ORDER BY roles.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list global roles: {error}")))?
        .into_iter()
        .map(Role::try_from)
        .collect()
    }

    pub(super) async fn assign_global_role_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| map_write_error(error, "assign global role"))?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn remove_global_role_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_roles
            WHERE user_id = $1 AND role_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove global role: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
