//! Database models for the permission system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named role scoped to a guard.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named permission scoped to a guard.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A permission with the roles that carry it eagerly loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionWithRoles {
    #[serde(flatten)]
    pub permission: Permission,
    pub roles: Vec<Role>,
}

impl PermissionWithRoles {
    /// Whether the role with `role_id` carries this permission.
    pub fn granted_to_role(&self, role_id: i64) -> bool {
        self.roles.iter().any(|r| r.id == role_id)
    }
}

/// The full permission universe as cached by [`super::cache::PermissionCache`].
///
/// Ordered by permission id, the order the backing store returns them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    pub permissions: Vec<PermissionWithRoles>,
}

impl PermissionSnapshot {
    pub const fn new(permissions: Vec<PermissionWithRoles>) -> Self {
        Self { permissions }
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Look up a permission by its `(name, guard_name)` pair.
    pub fn find_by_name(&self, name: &str, guard_name: &str) -> Option<&PermissionWithRoles> {
        self.permissions
            .iter()
            .find(|p| p.permission.name == name && p.permission.guard_name == guard_name)
    }

    pub fn find_by_id(&self, id: i64) -> Option<&PermissionWithRoles> {
        self.permissions.iter().find(|p| p.permission.id == id)
    }

    /// Every permission whose name is in `names` and guard is in `guard_names`.
    pub fn where_in<'a>(
        &'a self,
        names: &'a [String],
        guard_names: &'a [String],
    ) -> impl Iterator<Item = &'a PermissionWithRoles> + 'a {
        self.permissions.iter().filter(move |p| {
            names.contains(&p.permission.name) && guard_names.contains(&p.permission.guard_name)
        })
    }
}

/// Polymorphic key of a subject in the join tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    /// Model type, matched against the auth provider models (e.g. `"User"`).
    pub subject_type: String,
    pub subject_id: Uuid,
}

impl SubjectRef {
    pub fn new(subject_type: impl Into<String>, subject_id: Uuid) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id,
        }
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.subject_id)
    }
}

/// Capability implemented by anything that can hold roles and permissions.
///
/// The grants themselves live in the join tables keyed by [`SubjectRef`];
/// the subject only has to identify itself.
pub trait HasRoles: Send + Sync {
    /// Model type used to resolve the applicable guards.
    fn subject_type(&self) -> &str;

    fn subject_id(&self) -> Uuid;

    /// A subject pinned to a single guard. When `Some`, it is the subject's
    /// whole guard set.
    fn guard_name(&self) -> Option<&str> {
        None
    }

    fn subject_ref(&self) -> SubjectRef {
        SubjectRef::new(self.subject_type(), self.subject_id())
    }
}

/// How a subject is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Row is removed; role and permission grants are detached.
    Hard,
    /// Row is only flagged deleted; grants are retained.
    Soft,
}
