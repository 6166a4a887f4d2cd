//! Role-based access control for the Bastion back-office.
//!
//! # Purpose
//! Decides whether an authenticated caller, identified by a role alias, may
//! invoke a `(path, method)` pair. Verdicts come from a Casbin enforcer built
//! over the policy store and are memoized in a decision cache.
//!
//! # How it fits
//! The back-office service constructs one [`Authorizer`] and one [`RoleAdmin`]
//! over shared store and cache handles at start-up. The HTTP middleware calls
//! [`Authorizer::authorize`]; role handlers mutate permissions via [`RoleAdmin`].
//!
//! # Key invariants
//! - The super role is always allowed and can never be modified.
//! - Any failure to produce a verdict is a deny.
//! - Permission mutations invalidate affected cache entries before returning.
//!
//! # Examples
//! ```rust
//! use bastion_rbac::{
//!     Authorizer, Identity, InMemoryPolicyStore, LocalDecisionCache, PolicyEngine,
//!     PolicyRule, ResourceDescriptor,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), bastion_rbac::AuthorizeError> {
//! let store = Arc::new(InMemoryPolicyStore::with_rules([PolicyRule::new(
//!     "editor",
//!     "/admin/roles/list",
//!     "POST",
//! )]));
//! let engine = Arc::new(PolicyEngine::new(store.clone(), "super"));
//! let authorizer = Authorizer::new(store, engine, Arc::new(LocalDecisionCache::default()));
//! let verdict = authorizer
//!     .authorize(
//!         Some(&Identity::new(7, "editor")),
//!         &ResourceDescriptor::new("/admin/roles/list", "POST"),
//!     )
//!     .await?;
//! assert!(verdict.allowed);
//! # Ok(())
//! # }
//! ```
//!
//! # Common pitfalls
//! - Mutating the store directly skips cache invalidation; go through [`RoleAdmin`].
//! - Every cache miss reloads the whole policy set from the store.

mod admin;
mod authorizer;
mod cache;
mod casbin_model;
mod engine;
mod errors;
mod menu;
mod store;
mod types;

pub use admin::{GrantReport, ReplaceReport, RevokeReport, RoleAdmin, RuleFailure};
pub use authorizer::{AuthorizeError, Authorizer, Verdict, VerdictReason};
pub use cache::{CacheConfig, DecisionCache, DecisionKey, LocalDecisionCache};
pub use casbin_model::{casbin_model, casbin_model_string};
pub use engine::{PolicyEngine, build_enforcer};
pub use errors::{RbacError, RbacResult};
pub use menu::{RuleNode, RuleTree, ancestors, build_tree, default_rules, grantable_rules};
pub use store::PolicyStore;
pub use store::memory::InMemoryPolicyStore;
pub use types::{DEFAULT_SUPER_ROLE, Identity, POLICY_TYPE, PolicyRule, ResourceDescriptor, RoleAlias};
