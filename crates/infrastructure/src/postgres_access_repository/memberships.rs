use super::*;

impl PostgresAccessRepository {
    pub(super) async fn list_live_memberships_for_user_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RetreatMembership>> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, retreat_id, role_id, status, invited_by, invited_at, expires_at
            FROM retreat_memberships
            WHERE user_id = $1
                AND status IN ('pending', 'active')
            ORDER BY invited_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list memberships: {error}")))?
        .into_iter()
        .map(RetreatMembership::try_from)
        .collect()
    }

    pub(super) async fn list_memberships_for_retreat_impl(
        &self,
        retreat_id: RetreatId,
        status: Option<MembershipStatus>,
    ) -> AppResult<Vec<RetreatMembership>> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, retreat_id, role_id, status, invited_by, invited_at, expires_at
            FROM retreat_memberships
            WHERE retreat_id = $1
                AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY invited_at
            "#,
        )
        .bind(retreat_id.as_uuid())
        .bind(status.map(|status| status.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list retreat memberships: {error}"))
        })?
        .into_iter()
        .map(RetreatMembership::try_from)
        .collect()
    }

    pub(super) async fn find_membership_impl(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
    ) -> AppResult<Option<RetreatMembership>> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, retreat_id, role_id, status, invited_by, invited_at, expires_at
            FROM retreat_memberships
            WHERE user_id = $1 AND retreat_id = $2 AND role_id = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find membership: {error}")))?
        .map(RetreatMembership::try_from)
        .transpose()
    }

    pub(super) async fn upsert_membership_impl(
        &self,
        membership: RetreatMembership,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO retreat_memberships (
                user_id,
                retreat_id,
                role_id,
                status,
                invited_by,
                invited_at,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, retreat_id, role_id) DO UPDATE
            SET status = EXCLUDED.status,
                invited_by = EXCLUDED.invited_by,
                invited_at = EXCLUDED.invited_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(membership.user_id.as_uuid())
        .bind(membership.retreat_id.as_uuid())
        .bind(membership.role_id.as_uuid())
        .bind(membership.status.as_str())
        .bind(membership.invited_by.map(|user_id| user_id.as_uuid()))
        .bind(membership.invited_at)
        .bind(membership.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| map_write_error(error, "save membership"))?;

        Ok(())
    }

    pub(super) async fn transition_membership_impl(
        &self,
        user_id: UserId,
        retreat_id: RetreatId,
        role_id: RoleId,
        from: &[MembershipStatus],
        to: MembershipStatus,
    ) -> AppResult<bool> {
        let from: Vec<&str> = from.iter().map(MembershipStatus::as_str).collect();
        let result = sqlx::query(
            r#"
            UPDATE retreat_memberships
            SET status = $4
            WHERE user_id = $1
                AND retreat_id = $2
                AND role_id = $3
                AND status = ANY($5)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(retreat_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(to.as_str())
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update membership: {error}")))?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn expire_memberships_impl(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE retreat_memberships
            SET status = 'expired'
            WHERE status IN ('pending', 'active')
                AND expires_at IS NOT NULL
                AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to expire memberships: {error}")))?;

        Ok(result.rows_affected())
    }
}
