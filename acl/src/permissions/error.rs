//! ACL Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// How a role was referenced when it could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleKey {
    Name(String),
    Id(i64),
}

impl std::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "named `{name}`"),
            Self::Id(id) => write!(f, "with id `{id}`"),
        }
    }
}

/// ACL error types.
#[derive(Debug, Error)]
pub enum AclError {
    /// An explicit role reference did not resolve to a stored role.
    #[error("There is no role {0}.")]
    RoleNotFound(RoleKey),

    /// An explicit permission reference did not resolve to a stored permission.
    #[error("There is no permission named `{name}` for guard `{guard_name}`.")]
    PermissionNotFound { name: String, guard_name: String },

    #[error("A role `{name}` already exists for guard `{guard_name}`.")]
    RoleAlreadyExists { name: String, guard_name: String },

    #[error("A permission `{name}` already exists for guard `{guard_name}`.")]
    PermissionAlreadyExists { name: String, guard_name: String },

    /// A role or permission was used with a subject outside its guard.
    #[error(
        "The given role or permission should use guard `{}` instead of `{given}`.",
        .expected.join(", ")
    )]
    GuardMismatch { given: String, expected: Vec<String> },

    /// Boundary-level authorization failure.
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Cache store error.
    #[error("Cache error")]
    Cache(#[from] fred::error::Error),

    /// Cached snapshot could not be encoded or decoded.
    #[error("Cache serialization error")]
    Serialization(#[from] serde_json::Error),
}

impl AclError {
    pub fn permission_not_found(name: impl Into<String>, guard_name: impl Into<String>) -> Self {
        Self::PermissionNotFound {
            name: name.into(),
            guard_name: guard_name.into(),
        }
    }

    pub fn guard_mismatch(given: impl Into<String>, expected: &[String]) -> Self {
        Self::GuardMismatch {
            given: given.into(),
            expected: expected.to_vec(),
        }
    }

    /// Whether this is one of the "not found" lookup errors.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::RoleNotFound(_) | Self::PermissionNotFound { .. })
    }
}

/// Subject lacks the roles or permissions a boundary check required.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Unauthorized {
    message: String,
    required_roles: Vec<String>,
    required_permissions: Vec<String>,
}

impl Unauthorized {
    /// Failure of a role check. `display` lists the roles in the message.
    pub fn for_roles(roles: Vec<String>, display: bool) -> Self {
        let mut message = "User does not have the right roles.".to_string();
        if display {
            message = format!("{message} Necessary roles are {}", roles.join(", "));
        }

        Self {
            message,
            required_roles: roles,
            required_permissions: Vec::new(),
        }
    }

    /// Failure of a permission check. `display` lists the permissions in the message.
    pub fn for_permissions(permissions: Vec<String>, display: bool) -> Self {
        let mut message = "User does not have the right permissions.".to_string();
        if display {
            message = format!(
                "{message} Necessary permissions are {}",
                permissions.join(", ")
            );
        }

        Self {
            message,
            required_roles: Vec::new(),
            required_permissions: permissions,
        }
    }

    pub fn not_logged_in() -> Self {
        Self {
            message: "User is not logged in.".to_string(),
            required_roles: Vec::new(),
            required_permissions: Vec::new(),
        }
    }

    pub fn required_roles(&self) -> &[String] {
        &self.required_roles
    }

    pub fn required_permissions(&self) -> &[String] {
        &self.required_permissions
    }
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for AclError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::RoleNotFound(_) => (StatusCode::NOT_FOUND, "ROLE_NOT_FOUND"),
            Self::PermissionNotFound { .. } => (StatusCode::NOT_FOUND, "PERMISSION_NOT_FOUND"),
            Self::RoleAlreadyExists { .. } => (StatusCode::CONFLICT, "ROLE_EXISTS"),
            Self::PermissionAlreadyExists { .. } => (StatusCode::CONFLICT, "PERMISSION_EXISTS"),
            Self::GuardMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "GUARD_MISMATCH"),
            Self::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
            Self::Database(_) | Self::Cache(_) | Self::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for ACL operations.
pub type AclResult<T> = Result<T, AclError>;
