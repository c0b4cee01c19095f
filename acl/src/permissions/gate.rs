//! Authorization gate.
//!
//! A [`Gate`] answers "may this user perform this ability?". Before-hooks run
//! first in registration order and the first one with an opinion decides;
//! otherwise the ability's own check decides, and an undefined ability is
//! denied.
//!
//! [`register_permissions`] installs a hook that treats every ability name as
//! a permission name. The hook only ever allows: a missing permission, or a
//! name that is not a permission at all, leaves the decision to the rest of
//! the gate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::engine::Acl;
use super::error::{AclError, AclResult, Unauthorized};
use super::models::HasRoles;
use super::refs::RoleSpec;

/// Runs before every ability check. `Some` decides, `None` abstains.
#[async_trait]
pub trait BeforeHook<U: ?Sized>: Send + Sync {
    async fn before(&self, user: &U, ability: &str) -> AclResult<Option<bool>>;
}

/// Check behind a named ability.
#[async_trait]
pub trait AbilityCheck<U: ?Sized>: Send + Sync {
    async fn check(&self, user: &U) -> AclResult<bool>;
}

#[async_trait]
impl<U, F> AbilityCheck<U> for F
where
    U: ?Sized + Sync,
    F: Fn(&U) -> bool + Send + Sync,
{
    async fn check(&self, user: &U) -> AclResult<bool> {
        Ok(self(user))
    }
}

/// Ability registry with ordered before-hooks.
pub struct Gate<U: ?Sized> {
    hooks: Vec<Arc<dyn BeforeHook<U>>>,
    abilities: HashMap<String, Arc<dyn AbilityCheck<U>>>,
}

impl<U: ?Sized> Default for Gate<U> {
    fn default() -> Self {
        Self {
            hooks: Vec::new(),
            abilities: HashMap::new(),
        }
    }
}

impl<U: ?Sized + Sync> Gate<U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(&mut self, hook: impl BeforeHook<U> + 'static) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Define (or replace) the check behind `ability`.
    pub fn define(
        &mut self,
        ability: impl Into<String>,
        check: impl AbilityCheck<U> + 'static,
    ) -> &mut Self {
        self.abilities.insert(ability.into(), Arc::new(check));
        self
    }

    pub fn has(&self, ability: &str) -> bool {
        self.abilities.contains_key(ability)
    }

    pub async fn allows(&self, user: &U, ability: &str) -> AclResult<bool> {
        for hook in &self.hooks {
            if let Some(decision) = hook.before(user, ability).await? {
                return Ok(decision);
            }
        }

        match self.abilities.get(ability) {
            Some(check) => check.check(user).await,
            None => Ok(false),
        }
    }

    pub async fn denies(&self, user: &U, ability: &str) -> AclResult<bool> {
        Ok(!self.allows(user, ability).await?)
    }

    /// Whether any of `abilities` is allowed.
    pub async fn any(&self, user: &U, abilities: &[&str]) -> AclResult<bool> {
        for ability in abilities {
            if self.allows(user, ability).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Before-hook resolving abilities as permission names.
pub struct PermissionGateHook {
    acl: Arc<Acl>,
}

impl PermissionGateHook {
    pub const fn new(acl: Arc<Acl>) -> Self {
        Self { acl }
    }
}

#[async_trait]
impl<U: HasRoles + ?Sized> BeforeHook<U> for PermissionGateHook {
    async fn before(&self, user: &U, ability: &str) -> AclResult<Option<bool>> {
        match self.acl.has_permission_to(user, ability, None).await {
            Ok(true) => Ok(Some(true)),
            Ok(false) | Err(AclError::PermissionNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Install the permission hook on `gate`.
pub fn register_permissions<U: HasRoles + ?Sized>(gate: &mut Gate<U>, acl: Arc<Acl>) {
    gate.before(PermissionGateHook::new(acl));
}

/// Pass if `gate` allows any of the `|`-separated `permissions`.
///
/// Fails with `Unauthorized` when there is no subject or none is allowed.
pub async fn authorize_any_permission<U: HasRoles + ?Sized>(
    acl: &Acl,
    gate: &Gate<U>,
    subject: Option<&U>,
    permissions: &str,
) -> AclResult<()> {
    let Some(subject) = subject else {
        return Err(Unauthorized::not_logged_in().into());
    };

    let permissions: Vec<String> = permissions.split('|').map(str::to_string).collect();
    for permission in &permissions {
        if gate.allows(subject, permission).await? {
            return Ok(());
        }
    }

    Err(Unauthorized::for_permissions(permissions, acl.display_permission_in_exception()).into())
}

/// Pass if `subject` holds any of the `|`-separated `roles`.
///
/// Fails with `Unauthorized` when there is no subject or no role matches.
pub async fn authorize_any_role<U: HasRoles + ?Sized>(
    acl: &Acl,
    subject: Option<&U>,
    roles: &str,
) -> AclResult<()> {
    let Some(subject) = subject else {
        return Err(Unauthorized::not_logged_in().into());
    };

    let roles: Vec<String> = roles.split('|').map(str::to_string).collect();
    let spec = RoleSpec::Any(roles.iter().cloned().map(RoleSpec::Name).collect());
    if acl.has_any_role(subject, spec).await? {
        return Ok(());
    }

    Err(Unauthorized::for_roles(roles, acl.display_permission_in_exception()).into())
}
