//! In-process backing store.
//!
//! Keeps every table in a single `RwLock`-guarded state. Counts snapshot
//! loads so callers can observe how often the permission cache falls through.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::AclResult;
use super::models::{Permission, PermissionWithRoles, Role, SubjectRef};
use super::store::AclStore;

#[derive(Debug, Default)]
struct State {
    next_role_id: i64,
    next_permission_id: i64,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, Permission>,
    /// `(role_id, permission_id)`
    role_permissions: BTreeSet<(i64, i64)>,
    subject_roles: BTreeSet<(SubjectRef, i64)>,
    subject_permissions: BTreeSet<(SubjectRef, i64)>,
}

impl State {
    fn roles_by_ids(&self, ids: impl IntoIterator<Item = i64>) -> Vec<Role> {
        let ids: BTreeSet<i64> = ids.into_iter().collect();
        ids.iter().filter_map(|id| self.roles.get(id).cloned()).collect()
    }

    fn permissions_by_ids(&self, ids: impl IntoIterator<Item = i64>) -> Vec<Permission> {
        let ids: BTreeSet<i64> = ids.into_iter().collect();
        ids.iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect()
    }

    fn subject_role_ids(&self, subject: &SubjectRef) -> Vec<i64> {
        self.subject_roles
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// Backing store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    permission_loads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the full permission set has been loaded.
    pub fn permission_loads(&self) -> u64 {
        self.permission_loads.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AclStore for MemoryStore {
    async fn find_role_by_name(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.name == name && r.guard_name == guard_name)
            .cloned())
    }

    async fn find_role_by_id(&self, id: i64, guard_name: &str) -> AclResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .get(&id)
            .filter(|r| r.guard_name == guard_name)
            .cloned())
    }

    async fn list_roles(&self) -> AclResult<Vec<Role>> {
        Ok(self.state.read().await.roles.values().cloned().collect())
    }

    async fn insert_role(&self, name: &str, guard_name: &str) -> AclResult<Option<Role>> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|r| r.name == name && r.guard_name == guard_name)
        {
            return Ok(None);
        }

        state.next_role_id += 1;
        let now = Utc::now();
        let role = Role {
            id: state.next_role_id,
            name: name.to_string(),
            guard_name: guard_name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(Some(role))
    }

    async fn rename_role(&self, id: i64, name: &str) -> AclResult<Option<Role>> {
        let mut state = self.state.write().await;
        Ok(state.roles.get_mut(&id).map(|role| {
            role.name = name.to_string();
            role.updated_at = Utc::now();
            role.clone()
        }))
    }

    async fn delete_role(&self, id: i64) -> AclResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.roles.remove(&id).is_some();
        state.role_permissions.retain(|(role_id, _)| *role_id != id);
        state.subject_roles.retain(|(_, role_id)| *role_id != id);
        Ok(removed)
    }

    async fn load_permissions_with_roles(&self) -> AclResult<Vec<PermissionWithRoles>> {
        self.permission_loads.fetch_add(1, Ordering::AcqRel);

        let state = self.state.read().await;
        Ok(state
            .permissions
            .values()
            .map(|permission| PermissionWithRoles {
                permission: permission.clone(),
                roles: state.roles_by_ids(
                    state
                        .role_permissions
                        .iter()
                        .filter(|(_, p)| *p == permission.id)
                        .map(|(r, _)| *r),
                ),
            })
            .collect())
    }

    async fn insert_permission(
        &self,
        name: &str,
        guard_name: &str,
    ) -> AclResult<Option<Permission>> {
        let mut state = self.state.write().await;
        if state
            .permissions
            .values()
            .any(|p| p.name == name && p.guard_name == guard_name)
        {
            return Ok(None);
        }

        state.next_permission_id += 1;
        let now = Utc::now();
        let permission = Permission {
            id: state.next_permission_id,
            name: name.to_string(),
            guard_name: guard_name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(Some(permission))
    }

    async fn rename_permission(&self, id: i64, name: &str) -> AclResult<Option<Permission>> {
        let mut state = self.state.write().await;
        Ok(state.permissions.get_mut(&id).map(|permission| {
            permission.name = name.to_string();
            permission.updated_at = Utc::now();
            permission.clone()
        }))
    }

    async fn delete_permission(&self, id: i64) -> AclResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.permissions.remove(&id).is_some();
        state.role_permissions.retain(|(_, perm_id)| *perm_id != id);
        state.subject_permissions.retain(|(_, perm_id)| *perm_id != id);
        Ok(removed)
    }

    async fn role_permissions(&self, role_id: i64) -> AclResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions_by_ids(
            state
                .role_permissions
                .iter()
                .filter(|(r, _)| *r == role_id)
                .map(|(_, p)| *p),
        ))
    }

    async fn permission_roles(&self, permission_id: i64) -> AclResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.roles_by_ids(
            state
                .role_permissions
                .iter()
                .filter(|(_, p)| *p == permission_id)
                .map(|(r, _)| *r),
        ))
    }

    async fn attach_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> AclResult<()> {
        let mut state = self.state.write().await;
        for permission_id in permission_ids {
            state.role_permissions.insert((role_id, *permission_id));
        }
        Ok(())
    }

    async fn detach_role_permissions(
        &self,
        role_id: i64,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        let mut state = self.state.write().await;
        state.role_permissions.retain(|(r, p)| {
            *r != role_id || permission_ids.is_some_and(|ids| !ids.contains(p))
        });
        Ok(())
    }

    async fn attach_permission_roles(&self, permission_id: i64, role_ids: &[i64]) -> AclResult<()> {
        let mut state = self.state.write().await;
        for role_id in role_ids {
            state.role_permissions.insert((*role_id, permission_id));
        }
        Ok(())
    }

    async fn detach_permission_roles(
        &self,
        permission_id: i64,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        let mut state = self.state.write().await;
        state.role_permissions.retain(|(r, p)| {
            *p != permission_id || role_ids.is_some_and(|ids| !ids.contains(r))
        });
        Ok(())
    }

    async fn subject_roles(&self, subject: &SubjectRef) -> AclResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.roles_by_ids(state.subject_role_ids(subject)))
    }

    async fn attach_subject_roles(&self, subject: &SubjectRef, role_ids: &[i64]) -> AclResult<()> {
        let mut state = self.state.write().await;
        for role_id in role_ids {
            state.subject_roles.insert((subject.clone(), *role_id));
        }
        Ok(())
    }

    async fn detach_subject_roles(
        &self,
        subject: &SubjectRef,
        role_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        let mut state = self.state.write().await;
        state
            .subject_roles
            .retain(|(s, r)| s != subject || role_ids.is_some_and(|ids| !ids.contains(r)));
        Ok(())
    }

    async fn subject_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions_by_ids(
            state
                .subject_permissions
                .iter()
                .filter(|(s, _)| s == subject)
                .map(|(_, p)| *p),
        ))
    }

    async fn subject_role_permissions(&self, subject: &SubjectRef) -> AclResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions = Vec::new();
        for role_id in state.subject_role_ids(subject) {
            permissions.extend(
                state.permissions_by_ids(
                    state
                        .role_permissions
                        .iter()
                        .filter(|(r, _)| *r == role_id)
                        .map(|(_, p)| *p),
                ),
            );
        }
        Ok(permissions)
    }

    async fn attach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: &[i64],
    ) -> AclResult<()> {
        let mut state = self.state.write().await;
        for permission_id in permission_ids {
            state
                .subject_permissions
                .insert((subject.clone(), *permission_id));
        }
        Ok(())
    }

    async fn detach_subject_permissions(
        &self,
        subject: &SubjectRef,
        permission_ids: Option<&[i64]>,
    ) -> AclResult<()> {
        let mut state = self.state.write().await;
        state.subject_permissions.retain(|(s, p)| {
            s != subject || permission_ids.is_some_and(|ids| !ids.contains(p))
        });
        Ok(())
    }

    async fn subjects_having(
        &self,
        subject_type: &str,
        role_ids: &[i64],
        permission_ids: &[i64],
    ) -> AclResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let via_roles = state
            .subject_roles
            .iter()
            .filter(|(s, r)| s.subject_type == subject_type && role_ids.contains(r))
            .map(|(s, _)| s.subject_id);
        let direct = state
            .subject_permissions
            .iter()
            .filter(|(s, p)| s.subject_type == subject_type && permission_ids.contains(p))
            .map(|(s, _)| s.subject_id);

        let ids: BTreeSet<Uuid> = via_roles.chain(direct).collect();
        Ok(ids.into_iter().collect())
    }

    async fn detach_subject(&self, subject: &SubjectRef) -> AclResult<()> {
        let mut state = self.state.write().await;
        state.subject_roles.retain(|(s, _)| s != subject);
        state.subject_permissions.retain(|(s, _)| s != subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_role_rejects_duplicate_pair() {
        let store = MemoryStore::new();
        assert!(store.insert_role("editor", "web").await.unwrap().is_some());
        assert!(store.insert_role("editor", "web").await.unwrap().is_none());
        assert!(store.insert_role("editor", "api").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_detach_with_ids_keeps_other_rows() {
        let store = MemoryStore::new();
        let role = store.insert_role("editor", "web").await.unwrap().unwrap();
        let a = store.insert_permission("a", "web").await.unwrap().unwrap();
        let b = store.insert_permission("b", "web").await.unwrap().unwrap();

        store
            .attach_role_permissions(role.id, &[a.id, b.id])
            .await
            .unwrap();
        store
            .detach_role_permissions(role.id, Some(&[a.id][..]))
            .await
            .unwrap();

        let names: Vec<String> = store
            .role_permissions(role.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["b"]);

        store.detach_role_permissions(role.id, None).await.unwrap();
        assert!(store.role_permissions(role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_counts_and_eager_loads_roles() {
        let store = MemoryStore::new();
        let role = store.insert_role("editor", "web").await.unwrap().unwrap();
        let perm = store.insert_permission("a", "web").await.unwrap().unwrap();
        store
            .attach_permission_roles(perm.id, &[role.id])
            .await
            .unwrap();

        let loaded = store.load_permissions_with_roles().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].granted_to_role(role.id));
        assert_eq!(store.permission_loads(), 1);
    }

    #[tokio::test]
    async fn test_deleting_role_cascades_join_rows() {
        let store = MemoryStore::new();
        let subject = SubjectRef::new("User", Uuid::now_v7());
        let role = store.insert_role("editor", "web").await.unwrap().unwrap();
        store.attach_subject_roles(&subject, &[role.id]).await.unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(store.subject_roles(&subject).await.unwrap().is_empty());
    }
}
