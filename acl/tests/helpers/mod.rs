//! Shared fixtures for the engine integration tests.
//!
//! [`Fixture::new`] builds an engine over [`MemoryStore`] and
//! [`MemoryCacheStore`] with three guards: `web` and `api` authenticate
//! `User`, `admin` authenticates `Admin`. It seeds:
//! - roles `testRole`, `testRole2` (web) and `testAdminRole` (admin)
//! - permissions `edit-articles`, `edit-news` (web) and `admin-permission` (admin)
#![allow(dead_code)]

use std::sync::Arc;

use acl::config::Config;
use acl::permissions::{Acl, HasRoles, MemoryCacheStore, MemoryStore, Permission, Role};
use uuid::Uuid;

/// A subject authenticated by the `web` and `api` guards.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
}

impl User {
    pub fn new() -> Self {
        Self { id: Uuid::now_v7() }
    }
}

impl HasRoles for User {
    fn subject_type(&self) -> &str {
        "User"
    }

    fn subject_id(&self) -> Uuid {
        self.id
    }
}

/// A subject authenticated by the `admin` guard.
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: Uuid,
}

impl HasRoles for Admin {
    fn subject_type(&self) -> &str {
        "Admin"
    }

    fn subject_id(&self) -> Uuid {
        self.id
    }
}

/// A `User` pinned to a single guard.
#[derive(Debug, Clone)]
pub struct PinnedUser {
    pub id: Uuid,
    pub guard: &'static str,
}

impl HasRoles for PinnedUser {
    fn subject_type(&self) -> &str {
        "User"
    }

    fn subject_id(&self) -> Uuid {
        self.id
    }

    fn guard_name(&self) -> Option<&str> {
        Some(self.guard)
    }
}

/// A subject type no guard's provider authenticates.
#[derive(Debug, Clone)]
pub struct Robot {
    pub id: Uuid,
}

impl HasRoles for Robot {
    fn subject_type(&self) -> &str {
        "Robot"
    }

    fn subject_id(&self) -> Uuid {
        self.id
    }
}

pub struct Fixture {
    pub acl: Arc<Acl>,
    pub store: Arc<MemoryStore>,
    pub user: User,
    pub admin: Admin,
    pub user_role: Role,
    pub user_role2: Role,
    pub admin_role: Role,
    pub user_permission: Permission,
    pub user_permission2: Permission,
    pub admin_permission: Permission,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_display(false).await
    }

    /// Fixture whose `Unauthorized` messages list the missing requirements.
    pub async fn with_display(display: bool) -> Self {
        let mut config = Config::default_for_test().acl;
        config.display_permission_in_exception = display;

        let store = Arc::new(MemoryStore::new());
        let acl = Arc::new(Acl::new(
            store.clone(),
            Arc::new(MemoryCacheStore::new()),
            &config,
        ));

        let user_role = acl.create_role("testRole", None).await.unwrap();
        let user_role2 = acl.create_role("testRole2", None).await.unwrap();
        let admin_role = acl
            .create_role("testAdminRole", Some("admin"))
            .await
            .unwrap();
        let user_permission = acl.create_permission("edit-articles", None).await.unwrap();
        let user_permission2 = acl.create_permission("edit-news", None).await.unwrap();
        let admin_permission = acl
            .create_permission("admin-permission", Some("admin"))
            .await
            .unwrap();

        Self {
            acl,
            store,
            user: User::new(),
            admin: Admin { id: Uuid::now_v7() },
            user_role,
            user_role2,
            admin_role,
            user_permission,
            user_permission2,
            admin_permission,
        }
    }

    /// Snapshot loads so far.
    pub fn loads(&self) -> u64 {
        self.store.permission_loads()
    }
}

pub fn names(permissions: &[Permission]) -> Vec<&str> {
    permissions.iter().map(|p| p.name.as_str()).collect()
}
