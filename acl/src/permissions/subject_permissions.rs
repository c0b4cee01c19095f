//! Permission grants of subjects, direct and via roles.

use std::collections::HashSet;

use tracing::debug;

use super::engine::Acl;
use super::error::AclResult;
use super::models::{HasRoles, Permission};
use super::refs::PermissionRef;

/// Drop repeated permissions and order the rest by name.
fn unique_sorted(permissions: impl IntoIterator<Item = Permission>) -> Vec<Permission> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Permission> = permissions
        .into_iter()
        .filter(|p| seen.insert(p.id))
        .collect();
    unique.sort_by(|a, b| a.name.cmp(&b.name));
    unique
}

impl Acl {
    /// Whether `subject` holds `permission` directly or through a role.
    ///
    /// A name is resolved in `guard_name`, or the subject's default guard;
    /// an unknown name fails with `PermissionNotFound`.
    #[tracing::instrument(skip(self, subject, permission), fields(subject = %subject.subject_ref()))]
    pub async fn has_permission_to<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permission: impl Into<PermissionRef>,
        guard_name: Option<&str>,
    ) -> AclResult<bool> {
        let guard_name =
            guard_name.map_or_else(|| self.guards().default_name_for(subject), str::to_string);
        let permission = self.stored_permission(&permission.into(), &guard_name).await?;

        if self.holds_directly(subject, &permission).await? {
            return Ok(true);
        }
        self.holds_via_role(subject, &permission).await
    }

    /// Whether `subject` holds any of `permissions`. Unknown names count as
    /// not held.
    pub async fn has_any_permission<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permissions: &[PermissionRef],
    ) -> AclResult<bool> {
        for permission in permissions {
            match self.has_permission_to(subject, permission.clone(), None).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }

    /// Whether `permission` was granted straight to `subject`. An unknown
    /// name yields `false`.
    pub async fn has_direct_permission<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permission: impl Into<PermissionRef>,
    ) -> AclResult<bool> {
        let guard_name = self.guards().default_name_for(subject);
        match self.resolve_permission(&permission.into(), &guard_name).await? {
            Some(permission) => self.holds_directly(subject, &permission).await,
            None => Ok(false),
        }
    }

    async fn holds_directly<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permission: &Permission,
    ) -> AclResult<bool> {
        let direct = self.get_direct_permissions(subject).await?;
        Ok(direct.iter().any(|p| p.id == permission.id))
    }

    async fn holds_via_role<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permission: &Permission,
    ) -> AclResult<bool> {
        let carriers = self.roles_carrying(permission).await?;
        if carriers.is_empty() {
            return Ok(false);
        }

        let held = self.roles(subject).await?;
        Ok(held.iter().any(|r| carriers.iter().any(|c| c.id == r.id)))
    }

    /// Grant permissions straight to `subject`.
    ///
    /// Names are resolved in the subject's default guard. Nothing is granted
    /// unless every reference resolves and shares the subject's guard.
    #[tracing::instrument(skip(self, subject, permissions), fields(subject = %subject.subject_ref()))]
    pub async fn give_permission_to<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        let resolved = self.stored_permissions(permissions, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|p| p.id).collect();

        self.store()
            .attach_subject_permissions(&subject.subject_ref(), &ids)
            .await?;
        debug!(permissions = ?ids, "Permissions granted");

        self.forget_cached_permissions().await
    }

    /// Replace every direct permission of `subject` with `permissions`.
    #[tracing::instrument(skip(self, subject, permissions), fields(subject = %subject.subject_ref()))]
    pub async fn sync_permissions<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        let resolved = self.stored_permissions(permissions, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|p| p.id).collect();
        let subject_ref = subject.subject_ref();

        self.store()
            .detach_subject_permissions(&subject_ref, None)
            .await?;
        self.store()
            .attach_subject_permissions(&subject_ref, &ids)
            .await?;

        self.forget_cached_permissions().await
    }

    /// Revoke direct grants by name, across every guard of the subject.
    /// Names that match nothing are ignored.
    #[tracing::instrument(skip(self, subject, permissions), fields(subject = %subject.subject_ref()))]
    pub async fn revoke_permission_to<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        permissions: &[PermissionRef],
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        let ids = self.permission_ids_in_scope(permissions, &scope).await?;

        self.store()
            .detach_subject_permissions(&subject.subject_ref(), Some(ids.as_slice()))
            .await?;

        self.forget_cached_permissions().await
    }

    /// Permissions granted straight to `subject`.
    pub async fn get_direct_permissions<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
    ) -> AclResult<Vec<Permission>> {
        self.store()
            .subject_permissions(&subject.subject_ref())
            .await
    }

    /// Permissions carried by the subject's roles, unique and sorted by name.
    pub async fn get_permissions_via_roles<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
    ) -> AclResult<Vec<Permission>> {
        let via_roles = self
            .store()
            .subject_role_permissions(&subject.subject_ref())
            .await?;
        Ok(unique_sorted(via_roles))
    }

    /// Direct and role-derived permissions, unique and sorted by name.
    pub async fn get_all_permissions<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
    ) -> AclResult<Vec<Permission>> {
        let direct = self.get_direct_permissions(subject).await?;
        let via_roles = self
            .store()
            .subject_role_permissions(&subject.subject_ref())
            .await?;
        Ok(unique_sorted(direct.into_iter().chain(via_roles)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn permission(id: i64, name: &str) -> Permission {
        Permission {
            id,
            name: name.to_string(),
            guard_name: "web".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_sorted() {
        let permissions = vec![
            permission(3, "edit-news"),
            permission(1, "edit-articles"),
            permission(3, "edit-news"),
            permission(2, "delete-articles"),
        ];

        let names: Vec<String> = unique_sorted(permissions)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["delete-articles", "edit-articles", "edit-news"]);
    }
}
