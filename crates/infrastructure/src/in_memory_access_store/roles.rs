use super::*;

impl InMemoryAccessStore {
    pub(super) async fn find_role_by_name_impl(&self, name: &str) -> AppResult<Option<Role>> {
        let name = name.trim();
        Ok(self
            .roles
            .read()
            .await
            .values()
            .find(|role| role.name() == name)
            .cloned())
    }

    pub(super) async fn list_roles_by_ids_impl(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        let roles = self.roles.read().await;
        let mut listed: Vec<Role> = role_ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|role_id| roles.get(role_id).cloned())
            .collect();
        listed.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(listed)
    }

    pub(super) async fn list_permissions_for_roles_impl(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<PermissionKey>> {
        let grants = self.role_permissions.read().await;
        let permissions: BTreeSet<PermissionKey> = role_ids
            .iter()
            .filter_map(|role_id| grants.get(role_id))
            .flatten()
            .cloned()
            .collect();
        Ok(permissions.into_iter().collect())
    }

    pub(super) async fn list_global_roles_for_user_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<Role>> {
        let role_ids: Vec<RoleId> = self
            .global_roles
            .read()
            .await
            .iter()
            .filter(|(assigned_user, _)| *assigned_user == user_id)
            .map(|(_, role_id)| *role_id)
            .collect();

        self.list_roles_by_ids_impl(&role_ids).await
    }

    pub(super) async fn assign_global_role_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<bool> {
        if !self.roles.read().await.contains_key(&role_id) {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        Ok(self.global_roles.write().await.insert((user_id, role_id)))
    }
}
