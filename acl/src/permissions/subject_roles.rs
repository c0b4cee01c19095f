//! Role membership of subjects.

use tracing::debug;

use super::engine::Acl;
use super::error::AclResult;
use super::models::{Deletion, HasRoles, Role};
use super::refs::{split_pipes, RoleRef, RoleSpec};

/// Whether any of `held` matches `spec`.
///
/// Names are matched exactly, role objects and collections by id. Names
/// that do not exist simply do not match.
pub(crate) fn holds_any(held: &[Role], spec: &RoleSpec) -> bool {
    match spec {
        RoleSpec::Name(name) if name.contains('|') => split_pipes(name)
            .iter()
            .any(|name| held.iter().any(|r| &r.name == name)),
        RoleSpec::Name(name) => held.iter().any(|r| &r.name == name),
        RoleSpec::Role(role) => held.iter().any(|r| r.id == role.id),
        RoleSpec::Any(specs) => specs.iter().any(|spec| holds_any(held, spec)),
        RoleSpec::Roles(roles) => roles.iter().any(|role| held.iter().any(|r| r.id == role.id)),
    }
}

/// Whether `held` covers every role named by `spec`.
///
/// Single names and role objects behave like [`holds_any`]; lists are
/// compared by role name.
pub(crate) fn holds_all(held: &[Role], spec: &RoleSpec) -> bool {
    let required = match spec {
        RoleSpec::Name(name) if name.contains('|') => split_pipes(name),
        RoleSpec::Name(_) | RoleSpec::Role(_) => return holds_any(held, spec),
        RoleSpec::Any(_) | RoleSpec::Roles(_) => required_names(spec),
    };

    required
        .iter()
        .all(|name| held.iter().any(|r| &r.name == name))
}

fn required_names(spec: &RoleSpec) -> Vec<String> {
    match spec {
        RoleSpec::Name(name) => vec![name.clone()],
        RoleSpec::Role(role) => vec![role.name.clone()],
        RoleSpec::Any(specs) => specs.iter().flat_map(required_names).collect(),
        RoleSpec::Roles(roles) => roles.iter().map(|r| r.name.clone()).collect(),
    }
}

impl Acl {
    /// Roles assigned to `subject`.
    pub async fn roles<S: HasRoles + ?Sized>(&self, subject: &S) -> AclResult<Vec<Role>> {
        self.store().subject_roles(&subject.subject_ref()).await
    }

    /// Whether `subject` holds at least one role matching `roles`.
    pub async fn has_role<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        roles: impl Into<RoleSpec>,
    ) -> AclResult<bool> {
        let spec = roles.into();
        let held = self.roles(subject).await?;
        Ok(holds_any(&held, &spec))
    }

    /// Alias of [`Self::has_role`].
    pub async fn has_any_role<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        roles: impl Into<RoleSpec>,
    ) -> AclResult<bool> {
        self.has_role(subject, roles).await
    }

    /// Whether `subject` holds every role named by `roles`.
    pub async fn has_all_roles<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        roles: impl Into<RoleSpec>,
    ) -> AclResult<bool> {
        let spec = roles.into();
        let held = self.roles(subject).await?;
        Ok(holds_all(&held, &spec))
    }

    pub async fn get_role_names<S: HasRoles + ?Sized>(&self, subject: &S) -> AclResult<Vec<String>> {
        Ok(self
            .roles(subject)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    pub async fn assign_role<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        role: impl Into<RoleRef>,
    ) -> AclResult<()> {
        self.assign_roles(subject, &[role.into()]).await
    }

    /// Assign roles to `subject`.
    ///
    /// Names and ids are resolved in the subject's default guard. Nothing is
    /// attached unless every reference resolves and shares the subject's guard.
    #[tracing::instrument(skip(self, subject, roles), fields(subject = %subject.subject_ref()))]
    pub async fn assign_roles<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        roles: &[RoleRef],
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        let resolved = self.stored_roles(roles, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|r| r.id).collect();

        self.store()
            .attach_subject_roles(&subject.subject_ref(), &ids)
            .await?;
        debug!(roles = ?ids, "Roles assigned");

        self.forget_cached_permissions().await
    }

    /// Detach a role. A reference that does not resolve detaches nothing.
    #[tracing::instrument(skip(self, subject, role), fields(subject = %subject.subject_ref()))]
    pub async fn remove_role<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        role: impl Into<RoleRef>,
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        if let Some(role) = self.resolve_role(&role.into(), &scope.default).await? {
            self.store()
                .detach_subject_roles(&subject.subject_ref(), Some(&[role.id][..]))
                .await?;
        }

        self.forget_cached_permissions().await
    }

    /// Replace every role of `subject` with `roles`.
    #[tracing::instrument(skip(self, subject, roles), fields(subject = %subject.subject_ref()))]
    pub async fn sync_roles<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        roles: &[RoleRef],
    ) -> AclResult<()> {
        let scope = self.scope_for(subject);
        let resolved = self.stored_roles(roles, &scope).await?;
        let ids: Vec<i64> = resolved.iter().map(|r| r.id).collect();
        let subject_ref = subject.subject_ref();

        self.store().detach_subject_roles(&subject_ref, None).await?;
        self.store().attach_subject_roles(&subject_ref, &ids).await?;

        self.forget_cached_permissions().await
    }

    /// Clean up after a subject is deleted.
    ///
    /// A hard delete detaches every role and direct permission; a soft delete
    /// keeps them so a restored subject gets its grants back.
    #[tracing::instrument(skip(self, subject), fields(subject = %subject.subject_ref()))]
    pub async fn delete_subject<S: HasRoles + ?Sized>(
        &self,
        subject: &S,
        deletion: Deletion,
    ) -> AclResult<()> {
        match deletion {
            Deletion::Hard => self.store().detach_subject(&subject.subject_ref()).await,
            Deletion::Soft => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn role(id: i64, name: &str) -> Role {
        Role {
            id,
            name: name.to_string(),
            guard_name: "web".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn held() -> Vec<Role> {
        vec![role(1, "writer"), role(2, "editor")]
    }

    #[test]
    fn test_holds_any_by_name_and_pipe() {
        assert!(holds_any(&held(), &"writer".into()));
        assert!(!holds_any(&held(), &"admin".into()));
        assert!(holds_any(&held(), &"admin|editor".into()));
        assert!(!holds_any(&held(), &"admin|owner".into()));
    }

    #[test]
    fn test_holds_any_by_object_compares_ids() {
        assert!(holds_any(&held(), &role(2, "renamed").into()));
        assert!(!holds_any(&held(), &role(3, "writer").into()));
        assert!(holds_any(&held(), &vec![role(9, "x"), role(1, "y")].into()));
        assert!(!holds_any(&held(), &Vec::<Role>::new().into()));
    }

    #[test]
    fn test_holds_any_nested_lists() {
        let spec = RoleSpec::Any(vec![
            RoleSpec::from("admin"),
            RoleSpec::Any(vec![RoleSpec::from(role(2, "editor"))]),
        ]);
        assert!(holds_any(&held(), &spec));
        assert!(!holds_any(&held(), &RoleSpec::Any(vec![])));
    }

    #[test]
    fn test_holds_all() {
        assert!(holds_all(&held(), &["writer", "editor"].into()));
        assert!(!holds_all(&held(), &["writer", "admin"].into()));
        assert!(holds_all(&held(), &"writer|editor".into()));
        assert!(!holds_all(&held(), &"writer|admin".into()));
        assert!(holds_all(&held(), &vec![role(5, "writer")].into()));
    }

    #[test]
    fn test_holds_all_of_nothing() {
        assert!(holds_all(&[], &RoleSpec::Any(vec![])));
        assert!(!holds_all(&[], &"writer".into()));
    }
}
