//! Ways of referring to roles and permissions in API calls.

use super::models::{Permission, Role};

/// Reference to a single role for assignment/removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRef {
    Id(i64),
    Name(String),
    Role(Role),
}

impl From<i64> for RoleRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RoleRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for RoleRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Role> for RoleRef {
    fn from(role: Role) -> Self {
        Self::Role(role)
    }
}

impl From<&Role> for RoleRef {
    fn from(role: &Role) -> Self {
        Self::Role(role.clone())
    }
}

/// Reference to a single permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionRef {
    Name(String),
    Permission(Permission),
}

impl PermissionRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Permission(permission) => &permission.name,
        }
    }
}

impl From<&str> for PermissionRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PermissionRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for PermissionRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<Permission> for PermissionRef {
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(permission: &Permission) -> Self {
        Self::Permission(permission.clone())
    }
}

/// Role query for membership checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSpec {
    /// A role name, or `|`-separated alternatives.
    Name(String),
    Role(Role),
    /// Any of the listed specs.
    Any(Vec<RoleSpec>),
    /// A pre-fetched collection, compared by id.
    Roles(Vec<Role>),
}

impl From<&str> for RoleSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for RoleSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Role> for RoleSpec {
    fn from(role: Role) -> Self {
        Self::Role(role)
    }
}

impl From<&Role> for RoleSpec {
    fn from(role: &Role) -> Self {
        Self::Role(role.clone())
    }
}

impl From<Vec<Role>> for RoleSpec {
    fn from(roles: Vec<Role>) -> Self {
        Self::Roles(roles)
    }
}

impl From<&[Role]> for RoleSpec {
    fn from(roles: &[Role]) -> Self {
        Self::Roles(roles.to_vec())
    }
}

impl From<Vec<&str>> for RoleSpec {
    fn from(names: Vec<&str>) -> Self {
        Self::Any(names.into_iter().map(Self::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RoleSpec {
    fn from(names: [&str; N]) -> Self {
        Self::Any(names.into_iter().map(Self::from).collect())
    }
}

impl From<Vec<Self>> for RoleSpec {
    fn from(specs: Vec<Self>) -> Self {
        Self::Any(specs)
    }
}

/// Split a `|`-delimited list of alternatives.
///
/// Strings of at most two characters are returned whole. A string wrapped in
/// a matching pair of `'` or `"` has the quotes stripped and is still split.
pub fn split_pipes(input: &str) -> Vec<String> {
    let trimmed = input.trim();

    if trimmed.chars().count() <= 2 {
        return vec![trimmed.to_string()];
    }

    let unquoted = match trimmed.chars().next() {
        Some(quote @ ('\'' | '"')) if trimmed.ends_with(quote) => trimmed.trim_matches(quote),
        _ => trimmed,
    };

    unquoted.split('|').map(str::to_string).collect()
}
