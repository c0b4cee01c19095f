//! Role <-> permission grants.
//!
//! The relation can be edited from either side: a role is given
//! permissions, or a permission is assigned to roles. Both sides only accept
//! counterparts of their own guard.

use uuid::Uuid;

use super::engine::{Acl, GuardScope};
use super::error::AclResult;
use super::models::{Permission, Role};
use super::refs::{PermissionRef, RoleRef, RoleSpec};
use super::subject_roles::holds_any;

impl Acl {
    // ========================================================================
    // Role side
    // ========================================================================

    /// Permissions carried by `role`.
    pub async fn role_permissions(&self, role: &Role) -> AclResult<Vec<Permission>> {
        self.store().role_permissions(role.id).await
    }

    /// Whether `role` carries `permission`.
    ///
    /// A name is resolved in the role's guard; an unknown name fails with
    /// `PermissionNotFound` and a permission object of another guard with
    /// `GuardMismatch`.
    pub async fn role_has_permission_to(
        &self,
        role: &Role,
        permission: impl Into<PermissionRef>,
    ) -> AclResult<bool> {
        let scope = GuardScope::single(&role.guard_name);
        let permission = self
            .stored_permission(&permission.into(), &scope.default)
            .await?;
        scope.ensure(&permission.guard_name)?;

        let carried = self.role_permissions(role).await?;
        Ok(carried.iter().any(|p| p.id == permission.id))
    }

    #[tracing::instrument(skip(self, role, permissions), fields(role_id = role.id))]
    pub async fn give_permission_to_role(
        &self,
        role: &Role,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = GuardScope::single(&role.guard_name);
        let resolved = self.stored_permissions(permissions, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|p| p.id).collect();

        self.store().attach_role_permissions(role.id, &ids).await?;
        self.forget_cached_permissions().await
    }

    /// Revoke permissions from `role` by name. Unknown names are ignored.
    #[tracing::instrument(skip(self, role, permissions), fields(role_id = role.id))]
    pub async fn revoke_permission_from_role(
        &self,
        role: &Role,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = GuardScope::single(&role.guard_name);
        let ids = self.permission_ids_in_scope(permissions, &scope).await?;

        self.store()
            .detach_role_permissions(role.id, Some(ids.as_slice()))
            .await?;
        self.forget_cached_permissions().await
    }

    /// Replace every permission of `role` with `permissions`.
    #[tracing::instrument(skip(self, role, permissions), fields(role_id = role.id))]
    pub async fn sync_role_permissions(
        &self,
        role: &Role,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = GuardScope::single(&role.guard_name);
        let resolved = self.stored_permissions(permissions, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|p| p.id).collect();

        self.store().detach_role_permissions(role.id, None).await?;
        self.store().attach_role_permissions(role.id, &ids).await?;
        self.forget_cached_permissions().await
    }

    /// Subjects holding `role`, of the model its guard authenticates.
    ///
    /// Empty when the role's guard maps to no model.
    pub async fn subjects_with_role(&self, role: &Role) -> AclResult<Vec<Uuid>> {
        let Some(model) = self.guards().model_for_guard(&role.guard_name) else {
            return Ok(Vec::new());
        };
        self.store().subjects_having(model, &[role.id], &[]).await
    }

    // ========================================================================
    // Permission side
    // ========================================================================

    /// Roles carrying `permission`.
    pub async fn permission_roles(&self, permission: &Permission) -> AclResult<Vec<Role>> {
        self.store().permission_roles(permission.id).await
    }

    /// Whether a role matching `roles` carries `permission`.
    pub async fn permission_has_role(
        &self,
        permission: &Permission,
        roles: impl Into<RoleSpec>,
    ) -> AclResult<bool> {
        let spec = roles.into();
        let carriers = self.permission_roles(permission).await?;
        Ok(holds_any(&carriers, &spec))
    }

    /// Grant `permission` to roles. Names and ids are resolved in the
    /// permission's guard.
    #[tracing::instrument(skip(self, permission, roles), fields(permission_id = permission.id))]
    pub async fn assign_roles_to_permission(
        &self,
        permission: &Permission,
        roles: &[RoleRef],
    ) -> AclResult<()> {
        let scope = GuardScope::single(&permission.guard_name);
        let resolved = self.stored_roles(roles, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|r| r.id).collect();

        self.store()
            .attach_permission_roles(permission.id, &ids)
            .await?;
        self.forget_cached_permissions().await
    }

    /// Take `permission` away from a role. A reference that does not resolve
    /// detaches nothing.
    #[tracing::instrument(skip(self, permission, role), fields(permission_id = permission.id))]
    pub async fn remove_role_from_permission(
        &self,
        permission: &Permission,
        role: impl Into<RoleRef>,
    ) -> AclResult<()> {
        if let Some(role) = self
            .resolve_role(&role.into(), &permission.guard_name)
            .await?
        {
            self.store()
                .detach_permission_roles(permission.id, Some(&[role.id][..]))
                .await?;
        }
        self.forget_cached_permissions().await
    }

    /// Replace every role carrying `permission` with `roles`.
    #[tracing::instrument(skip(self, permission, roles), fields(permission_id = permission.id))]
    pub async fn sync_permission_roles(
        &self,
        permission: &Permission,
        roles: &[RoleRef],
    ) -> AclResult<()> {
        let scope = GuardScope::single(&permission.guard_name);
        let resolved = self.stored_roles(roles, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|r| r.id).collect();

        self.store()
            .detach_permission_roles(permission.id, None)
            .await?;
        self.store()
            .attach_permission_roles(permission.id, &ids)
            .await?;
        self.forget_cached_permissions().await
    }

    /// Subjects granted `permission` directly, of the model its guard
    /// authenticates.
    pub async fn subjects_with_permission(&self, permission: &Permission) -> AclResult<Vec<Uuid>> {
        let Some(model) = self.guards().model_for_guard(&permission.guard_name) else {
            return Ok(Vec::new());
        };
        self.store()
            .subjects_having(model, &[], &[permission.id])
            .await
    }
}
