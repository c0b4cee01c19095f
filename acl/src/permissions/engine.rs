//! Resolution engine.
//!
//! [`Acl`] ties the backing store, the permission cache and the guard
//! resolver together. Its operations are spread over several `impl Acl`
//! blocks:
//! - this module: entity management and shared resolution helpers
//! - [`super::subject_roles`]: role membership of subjects
//! - [`super::subject_permissions`]: permission grants of subjects
//! - [`super::grants`]: role <-> permission grants from either side
//! - [`super::scopes`]: subject filters

use std::sync::Arc;

use tracing::info;

use super::cache::{CacheStore, PermissionCache};
use super::error::{AclError, AclResult, RoleKey};
use super::guard::GuardResolver;
use super::models::{HasRoles, Permission, PermissionSnapshot, Role};
use super::refs::{PermissionRef, RoleRef};
use super::store::AclStore;
use crate::config::AclConfig;

/// Guards a role or permission holder may interact with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GuardScope {
    /// Guard names are resolved in.
    pub default: String,
    /// Every guard an attached role or permission may use.
    pub names: Vec<String>,
}

impl GuardScope {
    /// Scope of a role or permission: exactly its own guard.
    pub fn single(guard_name: &str) -> Self {
        Self {
            default: guard_name.to_string(),
            names: vec![guard_name.to_string()],
        }
    }

    pub fn ensure(&self, guard_name: &str) -> AclResult<()> {
        GuardResolver::ensure_shares_guard(&self.names, guard_name)
    }
}

/// The authorization engine.
pub struct Acl {
    store: Arc<dyn AclStore>,
    cache: PermissionCache,
    guards: GuardResolver,
    display_permission_in_exception: bool,
}

impl Acl {
    pub fn new(
        store: Arc<dyn AclStore>,
        cache_store: Arc<dyn CacheStore>,
        config: &AclConfig,
    ) -> Self {
        Self {
            store,
            cache: PermissionCache::new(cache_store, config.cache_key.clone(), config.cache_ttl()),
            guards: GuardResolver::new(config.auth.clone()),
            display_permission_in_exception: config.display_permission_in_exception,
        }
    }

    pub fn store(&self) -> &dyn AclStore {
        self.store.as_ref()
    }

    pub const fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    pub const fn guards(&self) -> &GuardResolver {
        &self.guards
    }

    /// Whether `Unauthorized` messages list the missing roles/permissions.
    pub const fn display_permission_in_exception(&self) -> bool {
        self.display_permission_in_exception
    }

    /// Every permission with its roles, served from the cache.
    pub async fn get_permissions(&self) -> AclResult<Arc<PermissionSnapshot>> {
        self.cache.remember(self.store.as_ref()).await
    }

    pub async fn forget_cached_permissions(&self) -> AclResult<()> {
        self.cache.invalidate().await
    }

    pub(crate) fn scope_for<S: HasRoles + ?Sized>(&self, subject: &S) -> GuardScope {
        GuardScope {
            default: self.guards.default_name_for(subject),
            names: self.guards.names_for(subject),
        }
    }

    pub(crate) fn scope_for_type(&self, subject_type: &str) -> GuardScope {
        GuardScope {
            default: self.guards.default_name_for_type(subject_type),
            names: self.guards.names_for_type(subject_type),
        }
    }

    fn guard_or_default(&self, guard_name: Option<&str>) -> String {
        guard_name
            .unwrap_or_else(|| self.guards.system_default())
            .to_string()
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Create a role. `guard_name` defaults to the system default guard.
    #[tracing::instrument(skip(self))]
    pub async fn create_role(&self, name: &str, guard_name: Option<&str>) -> AclResult<Role> {
        let guard_name = self.guard_or_default(guard_name);

        let Some(role) = self.store.insert_role(name, &guard_name).await? else {
            return Err(AclError::RoleAlreadyExists {
                name: name.to_string(),
                guard_name,
            });
        };

        self.forget_cached_permissions().await?;
        info!(role_id = role.id, guard = %role.guard_name, "Role created");
        Ok(role)
    }

    pub async fn find_role_by_name(
        &self,
        name: &str,
        guard_name: Option<&str>,
    ) -> AclResult<Option<Role>> {
        let guard_name = self.guard_or_default(guard_name);
        self.store.find_role_by_name(name, &guard_name).await
    }

    pub async fn find_role_by_id(&self, id: i64, guard_name: Option<&str>) -> AclResult<Option<Role>> {
        let guard_name = self.guard_or_default(guard_name);
        self.store.find_role_by_id(id, &guard_name).await
    }

    pub async fn list_roles(&self) -> AclResult<Vec<Role>> {
        self.store.list_roles().await
    }

    /// Rename a role within its guard.
    #[tracing::instrument(skip(self, role), fields(role_id = role.id))]
    pub async fn rename_role(&self, role: &Role, name: &str) -> AclResult<Role> {
        if let Some(existing) = self.store.find_role_by_name(name, &role.guard_name).await? {
            if existing.id != role.id {
                return Err(AclError::RoleAlreadyExists {
                    name: name.to_string(),
                    guard_name: role.guard_name.clone(),
                });
            }
        }

        let renamed = self
            .store
            .rename_role(role.id, name)
            .await?
            .ok_or_else(|| AclError::RoleNotFound(RoleKey::Id(role.id)))?;

        self.forget_cached_permissions().await?;
        Ok(renamed)
    }

    /// Delete a role. Its grants and assignments go with it.
    #[tracing::instrument(skip(self, role), fields(role_id = role.id))]
    pub async fn delete_role(&self, role: &Role) -> AclResult<bool> {
        let deleted = self.store.delete_role(role.id).await?;
        self.forget_cached_permissions().await?;
        if deleted {
            info!("Role deleted");
        }
        Ok(deleted)
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Create a permission. `guard_name` defaults to the system default guard.
    #[tracing::instrument(skip(self))]
    pub async fn create_permission(
        &self,
        name: &str,
        guard_name: Option<&str>,
    ) -> AclResult<Permission> {
        let guard_name = self.guard_or_default(guard_name);

        let Some(permission) = self.store.insert_permission(name, &guard_name).await? else {
            return Err(AclError::PermissionAlreadyExists {
                name: name.to_string(),
                guard_name,
            });
        };

        self.forget_cached_permissions().await?;
        info!(permission_id = permission.id, guard = %permission.guard_name, "Permission created");
        Ok(permission)
    }

    /// Look a permission up in the cached snapshot.
    pub async fn find_permission_by_name(
        &self,
        name: &str,
        guard_name: Option<&str>,
    ) -> AclResult<Option<Permission>> {
        let guard_name = self.guard_or_default(guard_name);
        let snapshot = self.get_permissions().await?;
        Ok(snapshot
            .find_by_name(name, &guard_name)
            .map(|p| p.permission.clone()))
    }

    pub async fn find_or_create_permission(
        &self,
        name: &str,
        guard_name: Option<&str>,
    ) -> AclResult<Permission> {
        let guard_name = self.guard_or_default(guard_name);
        if let Some(permission) = self.find_permission_by_name(name, Some(&guard_name)).await? {
            return Ok(permission);
        }
        self.create_permission(name, Some(&guard_name)).await
    }

    /// Rename a permission within its guard.
    #[tracing::instrument(skip(self, permission), fields(permission_id = permission.id))]
    pub async fn rename_permission(
        &self,
        permission: &Permission,
        name: &str,
    ) -> AclResult<Permission> {
        let taken = self
            .find_permission_by_name(name, Some(&permission.guard_name))
            .await?
            .is_some_and(|existing| existing.id != permission.id);
        if taken {
            return Err(AclError::PermissionAlreadyExists {
                name: name.to_string(),
                guard_name: permission.guard_name.clone(),
            });
        }

        let renamed = self
            .store
            .rename_permission(permission.id, name)
            .await?
            .ok_or_else(|| AclError::permission_not_found(&permission.name, &permission.guard_name))?;

        self.forget_cached_permissions().await?;
        Ok(renamed)
    }

    /// Delete a permission. Its grants go with it.
    #[tracing::instrument(skip(self, permission), fields(permission_id = permission.id))]
    pub async fn delete_permission(&self, permission: &Permission) -> AclResult<bool> {
        let deleted = self.store.delete_permission(permission.id).await?;
        self.forget_cached_permissions().await?;
        if deleted {
            info!("Permission deleted");
        }
        Ok(deleted)
    }

    // ========================================================================
    // Resolution helpers
    // ========================================================================

    /// Resolve a role reference in `guard_name`. Role objects pass through.
    pub(crate) async fn resolve_role(
        &self,
        role: &RoleRef,
        guard_name: &str,
    ) -> AclResult<Option<Role>> {
        match role {
            RoleRef::Role(role) => Ok(Some(role.clone())),
            RoleRef::Id(id) => self.store.find_role_by_id(*id, guard_name).await,
            RoleRef::Name(name) => self.store.find_role_by_name(name, guard_name).await,
        }
    }

    /// Like [`Self::resolve_role`], failing with `RoleNotFound` on a miss.
    pub(crate) async fn stored_role(&self, role: &RoleRef, guard_name: &str) -> AclResult<Role> {
        self.resolve_role(role, guard_name).await?.ok_or_else(|| {
            AclError::RoleNotFound(match role {
                RoleRef::Id(id) => RoleKey::Id(*id),
                RoleRef::Name(name) => RoleKey::Name(name.clone()),
                RoleRef::Role(role) => RoleKey::Id(role.id),
            })
        })
    }

    /// Resolve a permission reference in `guard_name` from the snapshot.
    pub(crate) async fn resolve_permission(
        &self,
        permission: &PermissionRef,
        guard_name: &str,
    ) -> AclResult<Option<Permission>> {
        match permission {
            PermissionRef::Permission(permission) => Ok(Some(permission.clone())),
            PermissionRef::Name(name) => self.find_permission_by_name(name, Some(guard_name)).await,
        }
    }

    /// Like [`Self::resolve_permission`], failing with `PermissionNotFound` on a miss.
    pub(crate) async fn stored_permission(
        &self,
        permission: &PermissionRef,
        guard_name: &str,
    ) -> AclResult<Permission> {
        self.resolve_permission(permission, guard_name)
            .await?
            .ok_or_else(|| AclError::permission_not_found(permission.name(), guard_name))
    }

    /// Resolve every reference, checking each against `scope`.
    pub(crate) async fn stored_permissions(
        &self,
        permissions: &[PermissionRef],
        scope: &GuardScope,
    ) -> AclResult<Vec<Permission>> {
        let mut resolved = Vec::with_capacity(permissions.len());
        for permission in permissions {
            let permission = self.stored_permission(permission, &scope.default).await?;
            scope.ensure(&permission.guard_name)?;
            resolved.push(permission);
        }
        Ok(resolved)
    }

    /// Resolve every reference, checking each against `scope`.
    pub(crate) async fn stored_roles(
        &self,
        roles: &[RoleRef],
        scope: &GuardScope,
    ) -> AclResult<Vec<Role>> {
        let mut resolved = Vec::with_capacity(roles.len());
        for role in roles {
            let role = self.stored_role(role, &scope.default).await?;
            scope.ensure(&role.guard_name)?;
            resolved.push(role);
        }
        Ok(resolved)
    }

    /// Ids of the stored permissions named in `permissions` within `scope`.
    ///
    /// Unknown names are skipped.
    pub(crate) async fn permission_ids_in_scope(
        &self,
        permissions: &[PermissionRef],
        scope: &GuardScope,
    ) -> AclResult<Vec<i64>> {
        let names: Vec<String> = permissions.iter().map(|p| p.name().to_string()).collect();
        let snapshot = self.get_permissions().await?;
        Ok(snapshot
            .where_in(&names, &scope.names)
            .map(|p| p.permission.id)
            .collect())
    }

    /// Roles carrying `permission`, from the snapshot when it is there.
    pub(crate) async fn roles_carrying(&self, permission: &Permission) -> AclResult<Vec<Role>> {
        let snapshot = self.get_permissions().await?;
        match snapshot.find_by_id(permission.id) {
            Some(cached) => Ok(cached.roles.clone()),
            None => self.store.permission_roles(permission.id).await,
        }
    }
}
