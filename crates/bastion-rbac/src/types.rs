//! Policy tuples, request descriptors, and caller identity.
//!
//! # Purpose
//! Shared shapes that flow between the policy store, the engine, the decision
//! cache and the HTTP layer.
//!
//! # Key invariants
//! - A [`PolicyRule`] is immutable once created; it is removed as a whole.
//! - [`Identity`] is attached to a request only after authentication succeeded.
//!
//! # Examples
//! ```rust
//! use bastion_rbac::{PolicyRule, ResourceDescriptor};
//!
//! let rule = PolicyRule::new("editor", "/admin/roles/list", "post");
//! assert_eq!(rule.method, "POST");
//! let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
//! assert!(rule.covers(&resource));
//! ```
use crate::errors::{RbacError, RbacResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Alias of the built-in unrestricted role.
pub const DEFAULT_SUPER_ROLE: &str = "super";

/// Policy type column value for permission rows.
pub const POLICY_TYPE: &str = "p";

/// Stable role identifier (distinct from the role's display name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAlias(String);

impl RoleAlias {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for RoleAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleAlias {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleAlias {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One granted capability: `role` may call `method` on `path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct PolicyRule {
    pub role: String,
    pub path: String,
    pub method: String,
}

impl PolicyRule {
    /// Build a rule, normalising the method to upper case.
    pub fn new(role: impl Into<String>, path: impl Into<String>, method: impl AsRef<str>) -> Self {
        Self {
            role: role.into(),
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
        }
    }

    /// Reject rules with empty components before they reach a store.
    pub fn validate(&self) -> RbacResult<()> {
        if self.role.trim().is_empty() {
            return Err(RbacError::InvalidRule("role is empty".to_string()));
        }
        if self.path.trim().is_empty() {
            return Err(RbacError::InvalidRule("path is empty".to_string()));
        }
        if self.method.trim().is_empty() {
            return Err(RbacError::InvalidRule("method is empty".to_string()));
        }
        Ok(())
    }

    pub fn covers(&self, resource: &ResourceDescriptor) -> bool {
        self.path == resource.path && self.method == resource.method
    }
}

/// `(path, method)` pair extracted from an incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    pub path: String,
    pub method: String,
}

impl ResourceDescriptor {
    pub fn new(path: impl Into<String>, method: impl AsRef<str>) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
        }
    }
}

/// Authenticated caller attached to a request by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: u64,
    pub role: RoleAlias,
}

impl Identity {
    pub fn new(subject_id: u64, role: impl Into<RoleAlias>) -> Self {
        Self {
            subject_id,
            role: role.into(),
        }
    }

    /// An identity with a zero subject or a blank role carries no usable claim.
    pub fn is_valid(&self) -> bool {
        self.subject_id > 0 && !self.role.is_empty()
    }
}
