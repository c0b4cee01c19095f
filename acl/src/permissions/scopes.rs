//! Subject filters.
//!
//! A [`SubjectFilter`] selects the subjects of one model type holding any of
//! a set of roles or direct permissions. Filtering by permission also admits
//! subjects holding a role that carries one of those permissions.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::engine::Acl;
use super::error::AclResult;
use super::models::{HasRoles, Permission, Role};
use super::refs::{PermissionRef, RoleRef};

/// Resolved subject filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFilter {
    pub subject_type: String,
    pub role_ids: BTreeSet<i64>,
    pub permission_ids: BTreeSet<i64>,
}

impl SubjectFilter {
    fn new(subject_type: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            role_ids: BTreeSet::new(),
            permission_ids: BTreeSet::new(),
        }
    }

    /// Whether a subject with these roles and direct permissions passes.
    pub fn matches(&self, roles: &[Role], permissions: &[Permission]) -> bool {
        roles.iter().any(|r| self.role_ids.contains(&r.id))
            || permissions.iter().any(|p| self.permission_ids.contains(&p.id))
    }
}

impl Acl {
    pub async fn having_role(
        &self,
        subject_type: &str,
        role: impl Into<RoleRef>,
    ) -> AclResult<SubjectFilter> {
        self.having_roles(subject_type, &[role.into()]).await
    }

    /// Filter on holding any of `roles`.
    ///
    /// Names are resolved in the default guard of `subject_type` and must
    /// exist; roles of a guard `subject_type` cannot use are rejected.
    pub async fn having_roles(
        &self,
        subject_type: &str,
        roles: &[RoleRef],
    ) -> AclResult<SubjectFilter> {
        let scope = self.scope_for_type(subject_type);
        let resolved = self.stored_roles(roles, &scope).await?;

        let mut filter = SubjectFilter::new(subject_type);
        filter.role_ids.extend(resolved.iter().map(|r| r.id));
        Ok(filter)
    }

    pub async fn having_permission(
        &self,
        subject_type: &str,
        permission: impl Into<PermissionRef>,
    ) -> AclResult<SubjectFilter> {
        self.having_permissions(subject_type, &[permission.into()])
            .await
    }

    /// Filter on holding any of `permissions`, directly or via a role.
    pub async fn having_permissions(
        &self,
        subject_type: &str,
        permissions: &[PermissionRef],
    ) -> AclResult<SubjectFilter> {
        let scope = self.scope_for_type(subject_type);
        let resolved = self.stored_permissions(permissions, &scope).await?;

        let mut filter = SubjectFilter::new(subject_type);
        for permission in &resolved {
            filter.permission_ids.insert(permission.id);
            let carriers = self.roles_carrying(permission).await?;
            filter.role_ids.extend(carriers.iter().map(|r| r.id));
        }
        Ok(filter)
    }

    /// Ids of every stored subject passing `filter`.
    pub async fn subjects_matching(&self, filter: &SubjectFilter) -> AclResult<Vec<Uuid>> {
        let role_ids: Vec<i64> = filter.role_ids.iter().copied().collect();
        let permission_ids: Vec<i64> = filter.permission_ids.iter().copied().collect();
        self.store()
            .subjects_having(&filter.subject_type, &role_ids, &permission_ids)
            .await
    }

    /// Keep the subjects of `subjects` passing `filter`, in order.
    pub async fn filter_subjects<S: HasRoles>(
        &self,
        filter: &SubjectFilter,
        subjects: Vec<S>,
    ) -> AclResult<Vec<S>> {
        let mut kept = Vec::with_capacity(subjects.len());
        for subject in subjects {
            if subject.subject_type() != filter.subject_type {
                continue;
            }
            let roles = self.roles(&subject).await?;
            let permissions = self.get_direct_permissions(&subject).await?;
            if filter.matches(&roles, &permissions) {
                kept.push(subject);
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_filter_matches_roles_or_permissions() {
        let mut filter = SubjectFilter::new("User");
        filter.role_ids.insert(2);
        filter.permission_ids.insert(7);

        let role = Role {
            id: 2,
            name: "editor".into(),
            guard_name: "web".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let permission = Permission {
            id: 7,
            name: "edit-articles".into(),
            guard_name: "web".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(filter.matches(&[role], &[]));
        assert!(filter.matches(&[], &[permission]));
        assert!(!filter.matches(&[], &[]));
    }
}
