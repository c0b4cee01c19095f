//! Guard resolution.
//!
//! A guard is a named authentication context. Each guard points at a user
//! provider, and each provider at a subject model type. A subject type may be
//! reachable through several guards.

use std::collections::HashMap;

use super::error::{AclError, AclResult};
use super::models::HasRoles;

/// A configured guard and the provider it authenticates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub name: String,
    pub provider: String,
}

/// Authentication configuration: guard -> provider -> model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Guard used when nothing else applies.
    pub default_guard: String,
    /// Guards in configuration order.
    pub guards: Vec<GuardConfig>,
    /// Provider name -> subject model type.
    pub providers: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_guard: "web".to_string(),
            guards: vec![GuardConfig {
                name: "web".to_string(),
                provider: "users".to_string(),
            }],
            providers: HashMap::from([("users".to_string(), "User".to_string())]),
        }
    }
}

impl AuthConfig {
    /// Model type served by `guard`, if the guard and its provider are configured.
    pub fn model_for_guard(&self, guard: &str) -> Option<&str> {
        self.guards
            .iter()
            .find(|g| g.name == guard)
            .and_then(|g| self.providers.get(&g.provider))
            .map(String::as_str)
    }
}

/// Resolves which guards apply to a subject.
#[derive(Debug, Clone)]
pub struct GuardResolver {
    config: AuthConfig,
}

impl GuardResolver {
    pub const fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn system_default(&self) -> &str {
        &self.config.default_guard
    }

    pub fn model_for_guard(&self, guard: &str) -> Option<&str> {
        self.config.model_for_guard(guard)
    }

    /// Every guard whose provider model is `subject_type`, in configuration order.
    pub fn names_for_type(&self, subject_type: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for guard in &self.config.guards {
            let model = self.config.providers.get(&guard.provider);
            if model.is_some_and(|m| m == subject_type) && !names.contains(&guard.name) {
                names.push(guard.name.clone());
            }
        }
        names
    }

    /// Guard names applicable to `subject`. May be empty.
    pub fn names_for<S: HasRoles + ?Sized>(&self, subject: &S) -> Vec<String> {
        match subject.guard_name() {
            Some(pinned) => vec![pinned.to_string()],
            None => self.names_for_type(subject.subject_type()),
        }
    }

    /// First applicable guard for `subject_type`, else the system default.
    pub fn default_name_for_type(&self, subject_type: &str) -> String {
        self.names_for_type(subject_type)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.config.default_guard.clone())
    }

    pub fn default_name_for<S: HasRoles + ?Sized>(&self, subject: &S) -> String {
        match subject.guard_name() {
            Some(pinned) => pinned.to_string(),
            None => self.default_name_for_type(subject.subject_type()),
        }
    }

    /// Fails with `GuardMismatch` unless `guard_name` is one of `names`.
    ///
    /// An empty `names` set never matches.
    pub fn ensure_shares_guard(names: &[String], guard_name: &str) -> AclResult<()> {
        if names.iter().any(|n| n == guard_name) {
            Ok(())
        } else {
            Err(AclError::guard_mismatch(guard_name, names))
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    struct Subject {
        kind: &'static str,
        pinned: Option<&'static str>,
    }

    impl HasRoles for Subject {
        fn subject_type(&self) -> &str {
            self.kind
        }

        fn subject_id(&self) -> Uuid {
            Uuid::nil()
        }

        fn guard_name(&self) -> Option<&str> {
            self.pinned
        }
    }

    fn resolver() -> GuardResolver {
        GuardResolver::new(AuthConfig {
            default_guard: "web".into(),
            guards: vec![
                GuardConfig {
                    name: "web".into(),
                    provider: "users".into(),
                },
                GuardConfig {
                    name: "api".into(),
                    provider: "users".into(),
                },
                GuardConfig {
                    name: "admin".into(),
                    provider: "admins".into(),
                },
            ],
            providers: HashMap::from([
                ("users".into(), "User".into()),
                ("admins".into(), "Admin".into()),
            ]),
        })
    }

    #[test]
    fn test_type_reachable_through_several_guards() {
        assert_eq!(resolver().names_for_type("User"), vec!["web", "api"]);
        assert_eq!(resolver().names_for_type("Admin"), vec!["admin"]);
    }

    #[test]
    fn test_default_name_is_first_matching_guard() {
        assert_eq!(resolver().default_name_for_type("Admin"), "admin");
        assert_eq!(resolver().default_name_for_type("User"), "web");
    }

    #[test]
    fn test_unmapped_type_falls_back_to_system_default() {
        let resolver = resolver();
        assert!(resolver.names_for_type("Robot").is_empty());
        assert_eq!(resolver.default_name_for_type("Robot"), "web");
    }

    #[test]
    fn test_pinned_guard_replaces_config_lookup() {
        let subject = Subject {
            kind: "User",
            pinned: Some("admin"),
        };
        assert_eq!(resolver().names_for(&subject), vec!["admin"]);
        assert_eq!(resolver().default_name_for(&subject), "admin");

        let unpinned = Subject {
            kind: "User",
            pinned: None,
        };
        assert_eq!(resolver().names_for(&unpinned), vec!["web", "api"]);
    }

    #[test]
    fn test_ensure_shares_guard() {
        let names = vec!["web".to_string(), "api".to_string()];
        assert!(GuardResolver::ensure_shares_guard(&names, "api").is_ok());
        assert!(matches!(
            GuardResolver::ensure_shares_guard(&names, "admin"),
            Err(AclError::GuardMismatch { .. })
        ));
        assert!(GuardResolver::ensure_shares_guard(&[], "web").is_err());
    }

    #[test]
    fn test_model_for_guard() {
        let config = AuthConfig::default();
        assert_eq!(config.model_for_guard("web"), Some("User"));
        assert_eq!(config.model_for_guard("admin"), None);
    }
}
