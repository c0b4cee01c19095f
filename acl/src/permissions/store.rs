//! Backing store abstraction.
//!
//! The engine only talks to persistence through [`AclStore`], so the same
//! resolution logic runs against Postgres ([`super::queries::PgStore`]) or the
//! in-process [`super::memory::MemoryStore`].

use async_trait::async_trait;
use uuid::Uuid;

use super::error::AclResult;
use super::models::{Permission, PermissionWithRoles, Role, SubjectRef};

/// Persistence for roles, permissions and their join relations.
///
/// Attach operations are idempotent. Detach operations take `None` to mean
/// "every row of this relation for the owner".
#[async_trait]
pub trait AclStore: Send + Sync {
    // ── Roles ──

    async fn find_role_by_name(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>>;
    async fn find_role_by_id(&self, id: i64, guard_name: &str) -> AclResult<Option<Role>>;
    async fn list_roles(&self) -> AclResult<Vec<Role>>;

    /// Insert a role. Returns `None` when `(name, guard_name)` is taken.
    async fn insert_role(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>>;
    async fn rename_role(&self, id: i64, name: &str) -> AclResult<Option<Role>>;
    async fn delete_role(&self, id: i64) -> AclResult<bool>;

    // ── Permissions ──

    /// Every permission with its roles, ordered by permission id.
    async fn load_permissions_with_roles(&self) -> AclResult<Vec<PermissionWithRoles>>;

    /// Insert a permission. Returns `None` when `(name, guard_name)` is taken.
    async fn insert_permission(&self, name: &str, guard_name: &str)
        -> AclResult<Option<Permission>>;
    async fn rename_permission(&self, id: i64, name: &str) -> AclResult<Option<Permission>>;
    async fn delete_permission(&self, id: i64) -> AclResult<bool>;

    // ── Role <-> Permission ──

    async fn role_permissions(&self, role_id: i64) -> AclResult<Vec<Permission>>;
    async fn permission_roles(&self, permission_id: i64) -> AclResult<Vec<Role>>;
    async fn attach_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> AclResult<()>;
    async fn detach_role_permissions(
        &self,
        role_id: i64,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()>;
    async fn attach_permission_roles(&self, permission_id: i64, role_ids: &[i64]) -> AclResult<()>;
    async fn detach_permission_roles(
        &self,
        permission_id: i64,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()>;

    // ── Subject <-> Role ──

    /// Roles assigned to the subject, ordered by role id.
    async fn subject_roles(&self, subject: &SubjectRef) -> AclResult<Vec<Role>>;
    async fn attach_subject_roles(&self, subject: &SubjectRef, role_ids: &[i64]) -> AclResult<()>;
    async fn detach_subject_roles(
        &self,
        subject: &SubjectRef,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()>;

    // ── Subject <-> Permission ──

    /// Directly granted permissions, ordered by permission id.
    async fn subject_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>>;

    /// Permissions carried by any of the subject's roles. May contain duplicates.
    async fn subject_role_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>>;
    async fn attach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: &[i64],
    ) -> AclResult<()>;
    async fn detach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()>;

    // ── Scopes ──

    /// Ids of subjects of `subject_type` holding any of `role_ids` or directly
    /// holding any of `permission_ids`.
    async fn subjects_having(
        &self,
        subject_type: &str,
        role_ids: &[i64],
        permission_ids: &[i64],
    ) -> AclResult<Vec<Uuid>>;

    /// Remove every role and permission row of the subject.
    async fn detach_subject(&self, subject: &SubjectRef) -> AclResult<()>;
}
