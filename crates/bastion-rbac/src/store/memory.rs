//! In-memory policy store.
//!
//! # Purpose
//! Keeps permission tuples in a `BTreeSet` guarded by `tokio::sync::RwLock`.
//! Used for local development, tests, and as the default backend when no
//! database is configured.
//!
//! # Durability and consistency
//! - **Not durable**: all tuples are lost on restart.
//! - Mutations take the write lock, so `remove_all_for_role` is atomic with
//!   respect to concurrent readers.
use super::PolicyStore;
use crate::errors::RbacResult;
use crate::types::PolicyRule;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyStore {
    rules: Arc<RwLock<BTreeSet<PolicyRule>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = PolicyRule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules.into_iter().collect())),
        }
    }

    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
        rule.validate()?;
        Ok(self.rules.write().await.insert(rule.clone()))
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
        Ok(self.rules.write().await.remove(rule))
    }

    async fn remove_all_for_role(&self, role: &str) -> RbacResult<u64> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|rule| rule.role != role);
        Ok((before - rules.len()) as u64)
    }

    async fn policies_for_role(&self, role: &str) -> RbacResult<Vec<PolicyRule>> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.role == role)
            .cloned()
            .collect())
    }

    async fn load_all(&self) -> RbacResult<Vec<PolicyRule>> {
        Ok(self.rules.read().await.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_policy_is_idempotent() {
        let store = InMemoryPolicyStore::new();
        let rule = PolicyRule::new("editor", "/admin/roles/list", "POST");
        assert!(store.add_policy(&rule).await.expect("first add"));
        assert!(!store.add_policy(&rule).await.expect("second add"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn add_policy_rejects_blank_rules() {
        let store = InMemoryPolicyStore::new();
        let err = store
            .add_policy(&PolicyRule::new("editor", "", "GET"))
            .await
            .expect_err("blank path");
        assert!(err.to_string().contains("path"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_policy_reports_absence_without_error() {
        let store = InMemoryPolicyStore::new();
        let rule = PolicyRule::new("editor", "/admin/roles/list", "POST");
        assert!(!store.remove_policy(&rule).await.expect("remove missing"));
        store.add_policy(&rule).await.expect("add");
        assert!(store.remove_policy(&rule).await.expect("remove"));
    }

    #[tokio::test]
    async fn remove_all_for_role_only_touches_that_role() {
        let store = InMemoryPolicyStore::with_rules([
            PolicyRule::new("editor", "/a", "GET"),
            PolicyRule::new("editor", "/b", "POST"),
            PolicyRule::new("viewer", "/a", "GET"),
        ]);
        assert_eq!(store.remove_all_for_role("editor").await.expect("bulk"), 2);
        assert!(store
            .policies_for_role("editor")
            .await
            .expect("list")
            .is_empty());
        assert_eq!(store.load_all().await.expect("all").len(), 1);
    }
}
