//! Role and permission authorization.
//!
//! Subjects hold roles and permissions within guards:
//! - Roles and permissions are unique per `(name, guard_name)`
//! - A subject only accepts roles/permissions of one of its guards
//! - A subject holds a permission directly or through any of its roles
//!
//! Permission lookups are served from a cached snapshot that every mutation
//! invalidates.

pub mod cache;
pub mod commands;
pub mod engine;
pub mod error;
pub mod gate;
pub mod grants;
pub mod guard;
pub mod memory;
pub mod models;
pub mod queries;
pub mod refs;
pub mod scopes;
pub mod store;
pub mod subject_permissions;
pub mod subject_roles;

pub use cache::{CacheStore, MemoryCacheStore, PermissionCache, RedisCacheStore, CACHE_KEY};
pub use engine::Acl;
pub use error::{AclError, AclResult, ErrorResponse, RoleKey, Unauthorized};
pub use gate::{
    authorize_any_permission, authorize_any_role, register_permissions, AbilityCheck, BeforeHook,
    Gate, PermissionGateHook,
};
pub use guard::{AuthConfig, GuardConfig, GuardResolver};
pub use memory::MemoryStore;
pub use models::*;
pub use queries::PgStore;
pub use refs::{split_pipes, PermissionRef, RoleRef, RoleSpec};
pub use scopes::SubjectFilter;
pub use store::AclStore;
