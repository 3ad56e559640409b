use serde::{Serialize, Serializer};
use std::fmt;

use super::principal::Role;

/// Why a response was or was not filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// Principal holds a role allowed to see AI content
    AuthorizedRole,
    /// Principal is not allowed to see AI content and the payload carries some
    UnauthorizedRole(Role),
    /// Payload carries nothing that needs protecting
    NoAiContent,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::AuthorizedRole => f.write_str("authorized_role"),
            FilterReason::UnauthorizedRole(role) => write!(f, "unauthorized_role_{}", role),
            FilterReason::NoAiContent => f.write_str("no_ai_content"),
        }
    }
}

impl Serialize for FilterReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of classifying one response for one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub should_filter: bool,
    pub reason: FilterReason,
    /// Sensitive patterns found in the payload. Empty for authorized principals.
    pub detected_fields: Vec<String>,
}

impl AccessDecision {
    pub fn authorized() -> Self {
        Self {
            should_filter: false,
            reason: FilterReason::AuthorizedRole,
            detected_fields: Vec::new(),
        }
    }

    pub fn clean() -> Self {
        Self {
            should_filter: false,
            reason: FilterReason::NoAiContent,
            detected_fields: Vec::new(),
        }
    }

    pub fn filter(role: Role, detected_fields: Vec<String>) -> Self {
        Self {
            should_filter: true,
            reason: FilterReason::UnauthorizedRole(role),
            detected_fields,
        }
    }
}
