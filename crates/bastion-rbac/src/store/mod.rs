//! Durable holder of permission tuples.
//!
//! # Purpose
//! Defines the [`PolicyStore`] contract shared by the in-memory backend in this
//! crate and the Postgres backend in the back-office service.
//!
//! # Key invariants
//! - `add_policy` is idempotent: re-inserting an existing tuple succeeds.
//! - `remove_all_for_role` removes every tuple of the role in one step.
//! - Stores never notify the engine or the decision cache; callers do.
use crate::errors::RbacResult;
use crate::types::PolicyRule;
use async_trait::async_trait;

pub mod memory;

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns `true` when a new row was written, `false` when it already existed.
    async fn add_policy(&self, rule: &PolicyRule) -> RbacResult<bool>;
    /// Returns `true` when the tuple was present and removed.
    async fn remove_policy(&self, rule: &PolicyRule) -> RbacResult<bool>;
    /// Returns the number of removed tuples.
    async fn remove_all_for_role(&self, role: &str) -> RbacResult<u64>;
    async fn policies_for_role(&self, role: &str) -> RbacResult<Vec<PolicyRule>>;
    async fn load_all(&self) -> RbacResult<Vec<PolicyRule>>;
}
