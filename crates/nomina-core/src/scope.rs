//! # Permission Scopes
//!
//! Access tokens carry a list of scope strings. A scope is either the
//! superuser scope [`ADMIN_SCOPE`] or `"<resource>:<action>"`, e.g.
//! `"employees:read"`. A route declares the scopes it accepts; holding any
//! one of them (or `Admin`) grants access.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The superuser scope. Grants every permission.
pub const ADMIN_SCOPE: &str = "Admin";

/// A validated permission scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    /// Validate a scope string.
    ///
    /// Accepts `Admin` or `<resource>:<action>` where both parts are
    /// non-empty and made of lowercase ASCII letters, digits or `_`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value == ADMIN_SCOPE {
            return Ok(Self(value));
        }
        let part_ok = |p: &str| {
            !p.is_empty()
                && p.bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        };
        match value.split_once(':') {
            Some((resource, action)) if part_ok(resource) && part_ok(action) => Ok(Self(value)),
            _ => Err(ValidationError::InvalidScope(value)),
        }
    }

    /// Access the scope string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the superuser scope.
    pub fn is_admin(&self) -> bool {
        self.0 == ADMIN_SCOPE
    }
}

impl TryFrom<String> for Scope {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scope> for String {
    fn from(value: Scope) -> Self {
        value.0
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `held` satisfies a route requiring any of `required`.
///
/// `Admin` satisfies everything; an empty `required` list is satisfied by
/// any caller.
pub fn grants<S: AsRef<str>>(held: &[S], required: &[&str]) -> bool {
    if required.is_empty() {
        return true;
    }
    held.iter().map(AsRef::as_ref).any(|h| h == ADMIN_SCOPE || required.contains(&h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_validation() {
        assert!(Scope::new("Admin").unwrap().is_admin());
        assert!(Scope::new("employees:read").is_ok());
        assert!(Scope::new("disbursements:delete").is_ok());
        assert!(Scope::new("employees").is_err());
        assert!(Scope::new(":read").is_err());
        assert!(Scope::new("Employees:Read").is_err());
        assert!(Scope::new("admin").is_err());
    }

    #[test]
    fn admin_grants_everything() {
        assert!(grants(&["Admin"], &["banks:write"]));
    }

    #[test]
    fn any_required_scope_suffices() {
        let held = ["banks:read".to_string()];
        assert!(grants(&held, &["banks:write", "banks:read"]));
        assert!(!grants(&held, &["banks:write"]));
    }

    #[test]
    fn empty_requirement_always_granted() {
        let none: [&str; 0] = [];
        assert!(grants(&none, &[]));
        assert!(!grants(&none, &["users:read"]));
    }
}
