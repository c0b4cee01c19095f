//! Database queries for the permission system.
//!
//! Provides the Postgres implementation of [`AclStore`]:
//! - Roles and permissions, unique per `(name, guard_name)`
//! - Role <-> permission grants
//! - Subject role assignments and direct permission grants

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::AclResult;
use super::models::{Permission, PermissionWithRoles, Role, SubjectRef};
use super::store::AclStore;

/// [`AclStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Role row joined to the permission it carries.
#[derive(Debug, sqlx::FromRow)]
struct PermissionRoleRow {
    permission_id: i64,
    #[sqlx(flatten)]
    role: Role,
}

#[async_trait]
impl AclStore for PgStore {
    // ============================================================================
    // Role Queries
    // ============================================================================

    async fn find_role_by_name(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r"
            SELECT id, name, guard_name, created_at, updated_at
            FROM roles
            WHERE name = $1 AND guard_name = $2
            ",
        )
        .bind(name)
        .bind(guard_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_role_by_id(&self, id: i64, guard_name: &str) -> AclResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r"
            SELECT id, name, guard_name, created_at, updated_at
            FROM roles
            WHERE id = $1 AND guard_name = $2
            ",
        )
        .bind(id)
        .bind(guard_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn list_roles(&self) -> AclResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r"
            SELECT id, name, guard_name, created_at, updated_at
            FROM roles
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn insert_role(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r"
            INSERT INTO roles (name, guard_name)
            VALUES ($1, $2)
            ON CONFLICT (name, guard_name) DO NOTHING
            RETURNING id, name, guard_name, created_at, updated_at
            ",
        )
        .bind(name)
        .bind(guard_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn rename_role(&self, id: i64, name: &str) -> AclResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r"
            UPDATE roles
            SET name = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, guard_name, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn delete_role(&self, id: i64) -> AclResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================================================
    // Permission Queries
    // ============================================================================

    /// Two queries: the permissions, then every role row attached to them.
    async fn load_permissions_with_roles(&self) -> AclResult<Vec<PermissionWithRoles>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r"
            SELECT id, name, guard_name, created_at, updated_at
            FROM permissions
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, PermissionRoleRow>(
            r"
            SELECT rp.permission_id, r.id, r.name, r.guard_name, r.created_at, r.updated_at
            FROM role_permissions rp
            INNER JOIN roles r ON r.id = rp.role_id
            ORDER BY r.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut roles_by_permission: BTreeMap<i64, Vec<Role>> = BTreeMap::new();
        for row in rows {
            roles_by_permission
                .entry(row.permission_id)
                .or_default()
                .push(row.role);
        }

        Ok(permissions
            .into_iter()
            .map(|permission| PermissionWithRoles {
                roles: roles_by_permission
                    .remove(&permission.id)
                    .unwrap_or_default(),
                permission,
            })
            .collect())
    }

    async fn insert_permission(
        &self,
        name: &str,
        guard_name: &str,
    ) -> AclResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            r"
            INSERT INTO permissions (name, guard_name)
            VALUES ($1, $2)
            ON CONFLICT (name, guard_name) DO NOTHING
            RETURNING id, name, guard_name, created_at, updated_at
            ",
        )
        .bind(name)
        .bind(guard_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn rename_permission(&self, id: i64, name: &str) -> AclResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            r"
            UPDATE permissions
            SET name = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, guard_name, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn delete_permission(&self, id: i64) -> AclResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================================================
    // Role <-> Permission Queries
    // ============================================================================

    async fn role_permissions(&self, role_id: i64) -> AclResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r"
            SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.id ASC
            ",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn permission_roles(&self, permission_id: i64) -> AclResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r"
            SELECT r.id, r.name, r.guard_name, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN role_permissions rp ON rp.role_id = r.id
            WHERE rp.permission_id = $1
            ORDER BY r.id ASC
            ",
        )
        .bind(permission_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn attach_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> AclResult<()> {
        sqlx::query(
            r"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn detach_role_permissions(
        &self,
        role_id: i64,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        sqlx::query(
            r"
            DELETE FROM role_permissions
            WHERE role_id = $1
              AND ($2::bigint[] IS NULL OR permission_id = ANY($2))
            ",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attach_permission_roles(&self, permission_id: i64, role_ids: &[i64]) -> AclResult<()> {
        sqlx::query(
            r"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT UNNEST($2::bigint[]), $1
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(permission_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn detach_permission_roles(
        &self,
        permission_id: i64,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        sqlx::query(
            r"
            DELETE FROM role_permissions
            WHERE permission_id = $1
              AND ($2::bigint[] IS NULL OR role_id = ANY($2))
            ",
        )
        .bind(permission_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================================================
    // Subject Role Queries
    // ============================================================================

    async fn subject_roles(&self, subject: &SubjectRef) -> AclResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r"
            SELECT r.id, r.name, r.guard_name, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN subject_roles sr ON sr.role_id = r.id
            WHERE sr.subject_type = $1 AND sr.subject_id = $2
            ORDER BY r.id ASC
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn attach_subject_roles(&self, subject: &SubjectRef, role_ids: &[i64]) -> AclResult<()> {
        sqlx::query(
            r"
            INSERT INTO subject_roles (subject_type, subject_id, role_id)
            SELECT $1, $2, UNNEST($3::bigint[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn detach_subject_roles(
        &self,
        subject: &SubjectRef,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        sqlx::query(
            r"
            DELETE FROM subject_roles
            WHERE subject_type = $1 AND subject_id = $2
              AND ($3::bigint[] IS NULL OR role_id = ANY($3))
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================================================
    // Subject Permission Queries
    // ============================================================================

    async fn subject_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r"
            SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN subject_permissions sp ON sp.permission_id = p.id
            WHERE sp.subject_type = $1 AND sp.subject_id = $2
            ORDER BY p.id ASC
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn subject_role_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r"
            SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            INNER JOIN subject_roles sr ON sr.role_id = rp.role_id
            WHERE sr.subject_type = $1 AND sr.subject_id = $2
            ORDER BY sr.role_id ASC, p.id ASC
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn attach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: &[i64],
    ) -> AclResult<()> {
        sqlx::query(
            r"
            INSERT INTO subject_permissions (subject_type, subject_id, permission_id)
            SELECT $1, $2, UNNEST($3::bigint[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(permission_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn detach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        sqlx::query(
            r"
            DELETE FROM subject_permissions
            WHERE subject_type = $1 AND subject_id = $2
              AND ($3::bigint[] IS NULL OR permission_id = ANY($3))
            ",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(permission_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================================================
    // Scope Queries
    // ============================================================================

    async fn subjects_having(
        &self,
        subject_type: &str,
        role_ids: &[i64],
        permission_ids: &[i64],
    ) -> AclResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r"
            SELECT subject_id FROM subject_roles
            WHERE subject_type = $1 AND role_id = ANY($2)
            UNION
            SELECT subject_id FROM subject_permissions
            WHERE subject_type = $1 AND permission_id = ANY($3)
            ORDER BY subject_id
            ",
        )
        .bind(subject_type)
        .bind(role_ids)
        .bind(permission_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn detach_subject(&self, subject: &SubjectRef) -> AclResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM subject_roles WHERE subject_type = $1 AND subject_id = $2")
            .bind(&subject.subject_type)
            .bind(subject.subject_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM subject_permissions WHERE subject_type = $1 AND subject_id = $2")
            .bind(&subject.subject_type)
            .bind(subject.subject_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
