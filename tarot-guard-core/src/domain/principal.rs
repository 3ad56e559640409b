use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Identifier recorded for requests that carry no verified identity.
pub const ANONYMOUS_ID: &str = "anonymous";

/// Roles a requester can hold on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Paying customer receiving readings
    Client,
    /// Psychic reader performing sessions
    Reader,
    /// Back-office administrator
    Admin,
    /// Platform owner
    SuperAdmin,
    /// Unauthenticated requester
    Anonymous,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Reader => "reader",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Anonymous => "anonymous",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "reader" => Ok(Role::Reader),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            "anonymous" => Ok(Role::Anonymous),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actor making a request, as resolved by authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: ANONYMOUS_ID.to_string(),
            role: Role::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role == Role::Anonymous
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Roles permitted to see AI-derived content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRoles(HashSet<Role>);

impl AuthorizedRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

impl Default for AuthorizedRoles {
    fn default() -> Self {
        Self::new([Role::Reader, Role::Admin, Role::SuperAdmin])
    }
}
