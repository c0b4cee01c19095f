//! Administrative entry points behind the `acl` binary.
//!
//! Each returns the line to show the operator.

use tracing::info;

use super::engine::Acl;
use super::error::AclResult;

/// Create a role, in the default guard unless `guard_name` is given.
pub async fn create_role(acl: &Acl, name: &str, guard_name: Option<&str>) -> AclResult<String> {
    let role = acl.create_role(name, guard_name).await?;
    Ok(format!("Role `{}` created", role.name))
}

/// Create a permission, in the default guard unless `guard_name` is given.
pub async fn create_permission(
    acl: &Acl,
    name: &str,
    guard_name: Option<&str>,
) -> AclResult<String> {
    let permission = acl.create_permission(name, guard_name).await?;
    Ok(format!("Permission `{}` created", permission.name))
}

/// Drop the cached permission snapshot.
pub async fn clear_cache(acl: &Acl) -> AclResult<String> {
    acl.forget_cached_permissions().await?;
    info!(key = acl.cache().key(), "ACL cache cleared");
    Ok("The ACL cache has been cleared.".to_string())
}
