//! Role permission administration.
//!
//! # Purpose
//! Grants, revokes and replaces the permission tuples of a role, and removes a
//! role's tuples when the role is deleted. Each mutation invalidates the
//! decision cache entries it affects before returning.
//!
//! # Key invariants
//! - The super role is never modified; attempts fail with
//!   [`RbacError::ProtectedRole`] before the store is touched.
//! - Grant and revoke are best-effort per tuple; failures are collected in the
//!   report and do not undo successful tuples.
//! - Only the keys that actually changed are invalidated, except for role
//!   deletion which drops every entry of the role.
use crate::cache::{DecisionCache, DecisionKey};
use crate::errors::{RbacError, RbacResult};
use crate::store::PolicyStore;
use crate::types::{PolicyRule, RoleAlias};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// A tuple that could not be written or removed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RuleFailure {
    pub rule: PolicyRule,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct GrantReport {
    /// Tuples written by this call.
    pub granted: Vec<PolicyRule>,
    /// Tuples that already existed; counted as success.
    pub unchanged: Vec<PolicyRule>,
    pub failures: Vec<RuleFailure>,
}

impl GrantReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevokeReport {
    pub revoked: Vec<PolicyRule>,
    pub failures: Vec<RuleFailure>,
}

impl RevokeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReplaceReport {
    pub revoke: RevokeReport,
    pub grant: GrantReport,
}

#[derive(Clone)]
pub struct RoleAdmin {
    store: Arc<dyn PolicyStore>,
    cache: Arc<dyn DecisionCache>,
    super_role: RoleAlias,
}

impl RoleAdmin {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        cache: Arc<dyn DecisionCache>,
        super_role: impl Into<RoleAlias>,
    ) -> Self {
        Self {
            store,
            cache,
            super_role: super_role.into(),
        }
    }

    pub fn super_role(&self) -> &RoleAlias {
        &self.super_role
    }

    fn guard(&self, role: &str) -> RbacResult<()> {
        if role == self.super_role.as_str() {
            tracing::warn!(role, "rejected mutation of protected role");
            return Err(RbacError::ProtectedRole(role.to_string()));
        }
        Ok(())
    }

    /// Write each tuple for `role`.
    ///
    /// # Errors
    /// - [`RbacError::ProtectedRole`] for the super role.
    /// - [`RbacError::Cache`] when the affected entries could not be invalidated.
    pub async fn grant_permissions(
        &self,
        role: &str,
        rules: &[PolicyRule],
    ) -> RbacResult<GrantReport> {
        self.guard(role)?;
        let mut report = GrantReport::default();
        for rule in rules {
            if rule.role != role {
                report.failures.push(RuleFailure {
                    rule: rule.clone(),
                    error: format!("rule belongs to role {}", rule.role),
                });
                continue;
            }
            if let Err(err) = rule.validate() {
                report.failures.push(RuleFailure {
                    rule: rule.clone(),
                    error: err.to_string(),
                });
                continue;
            }
            match self.store.add_policy(rule).await {
                Ok(true) => report.granted.push(rule.clone()),
                Ok(false) => report.unchanged.push(rule.clone()),
                Err(err) => {
                    tracing::warn!(error = %err, role, path = %rule.path, "grant failed");
                    report.failures.push(RuleFailure {
                        rule: rule.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        // A cached deny must not outlive the grant.
        self.invalidate_rules(&report.granted).await?;
        metrics::counter!("bastion_policy_grants_total").increment(report.granted.len() as u64);
        tracing::info!(
            role,
            granted = report.granted.len(),
            failed = report.failures.len(),
            "permissions granted"
        );
        Ok(report)
    }

    /// Remove every tuple currently held by `role`.
    ///
    /// # Errors
    /// - [`RbacError::ProtectedRole`] for the super role.
    /// - Store errors while enumerating the role's tuples.
    /// - [`RbacError::Cache`] when the removed keys could not be invalidated.
    pub async fn revoke_permissions(&self, role: &str) -> RbacResult<RevokeReport> {
        self.guard(role)?;
        let current = self.store.policies_for_role(role).await?;
        let mut report = RevokeReport::default();
        for rule in current {
            match self.store.remove_policy(&rule).await {
                Ok(true) => report.revoked.push(rule),
                // Removed concurrently; nothing left to invalidate for it.
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, role, path = %rule.path, "revoke failed");
                    report.failures.push(RuleFailure {
                        rule,
                        error: err.to_string(),
                    });
                }
            }
        }
        self.invalidate_rules(&report.revoked).await?;
        metrics::counter!("bastion_policy_revokes_total").increment(report.revoked.len() as u64);
        tracing::info!(
            role,
            revoked = report.revoked.len(),
            failed = report.failures.len(),
            "permissions revoked"
        );
        Ok(report)
    }

    /// Role update: revoke the old tuples, then grant `rules`.
    pub async fn replace_permissions(
        &self,
        role: &str,
        rules: &[PolicyRule],
    ) -> RbacResult<ReplaceReport> {
        self.guard(role)?;
        let revoke = self.revoke_permissions(role).await?;
        let grant = self.grant_permissions(role, rules).await?;
        Ok(ReplaceReport { revoke, grant })
    }

    /// Remove all tuples of `role` in one store call. Returns the removed count.
    pub async fn delete_role(&self, role: &str) -> RbacResult<u64> {
        self.guard(role)?;
        let removed = self.store.remove_all_for_role(role).await?;
        if let Err(err) = self.cache.invalidate_role(role).await {
            tracing::error!(error = %err, role, "role invalidation failed; clearing decision cache");
            self.cache.clear().await?;
        }
        tracing::info!(role, removed, "role permissions deleted");
        Ok(removed)
    }

    async fn invalidate_rules(&self, rules: &[PolicyRule]) -> RbacResult<()> {
        for rule in rules {
            if let Err(err) = self.cache.invalidate(&DecisionKey::from(rule)).await {
                tracing::error!(error = %err, role = %rule.role, "targeted invalidation failed; clearing decision cache");
                return self.cache.clear().await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::{Authorizer, VerdictReason};
    use crate::cache::LocalDecisionCache;
    use crate::engine::PolicyEngine;
    use crate::store::memory::InMemoryPolicyStore;
    use crate::types::{Identity, ResourceDescriptor};
    use async_trait::async_trait;

    struct Harness {
        store: Arc<InMemoryPolicyStore>,
        cache: Arc<LocalDecisionCache>,
        admin: RoleAdmin,
        authorizer: Authorizer,
    }

    fn harness(rules: Vec<PolicyRule>) -> Harness {
        let store = Arc::new(InMemoryPolicyStore::with_rules(rules));
        let cache = Arc::new(LocalDecisionCache::default());
        let engine = Arc::new(PolicyEngine::new(store.clone(), "super"));
        let authorizer = Authorizer::new(store.clone(), engine, cache.clone());
        let admin = RoleAdmin::new(store.clone(), cache.clone(), "super");
        Harness {
            store,
            cache,
            admin,
            authorizer,
        }
    }

    /// Store that rejects writes to one path.
    struct PickyStore {
        inner: InMemoryPolicyStore,
        rejected_path: &'static str,
    }

    #[async_trait]
    impl PolicyStore for PickyStore {
        async fn add_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
            if rule.path == self.rejected_path {
                return Err(RbacError::Store(anyhow::anyhow!("write rejected")));
            }
            self.inner.add_policy(rule).await
        }
        async fn remove_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
            if rule.path == self.rejected_path {
                return Err(RbacError::Store(anyhow::anyhow!("delete rejected")));
            }
            self.inner.remove_policy(rule).await
        }
        async fn remove_all_for_role(&self, role: &str) -> RbacResult<u64> {
            self.inner.remove_all_for_role(role).await
        }
        async fn policies_for_role(&self, role: &str) -> RbacResult<Vec<PolicyRule>> {
            self.inner.policies_for_role(role).await
        }
        async fn load_all(&self) -> RbacResult<Vec<PolicyRule>> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn grant_then_request_is_allowed() {
        let h = harness(Vec::new());
        let report = h
            .admin
            .grant_permissions(
                "editor",
                &[PolicyRule::new("editor", "/admin/roles/list", "POST")],
            )
            .await
            .expect("grant");
        assert_eq!(report.granted.len(), 1);
        assert!(report.is_complete());

        let verdict = h
            .authorizer
            .authorize(
                Some(&Identity::new(2, "editor")),
                &ResourceDescriptor::new("/admin/roles/list", "POST"),
            )
            .await
            .expect("verdict");
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn grant_invalidates_cached_deny() {
        let h = harness(Vec::new());
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        assert!(!h
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict")
            .allowed);

        h.admin
            .grant_permissions(
                "editor",
                &[PolicyRule::new("editor", "/admin/roles/list", "POST")],
            )
            .await
            .expect("grant");

        let verdict = h
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, VerdictReason::Evaluated);
    }

    #[tokio::test]
    async fn repeated_grant_is_reported_unchanged() {
        let rule = PolicyRule::new("editor", "/admin/roles/list", "POST");
        let h = harness(vec![rule.clone()]);
        let report = h
            .admin
            .grant_permissions("editor", &[rule.clone()])
            .await
            .expect("grant");
        assert!(report.granted.is_empty());
        assert_eq!(report.unchanged, vec![rule]);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn grant_reports_foreign_role_rules() {
        let h = harness(Vec::new());
        let report = h
            .admin
            .grant_permissions("editor", &[PolicyRule::new("viewer", "/a", "GET")])
            .await
            .expect("grant");
        assert_eq!(report.failures.len(), 1);
        assert!(h.store.is_empty().await);
    }

    /// Store that accepts any tuple and only counts writes.
    #[derive(Default)]
    struct CountingStore {
        writes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn add_policy(&self, _rule: &PolicyRule) -> RbacResult<bool> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(true)
        }
        async fn remove_policy(&self, _rule: &PolicyRule) -> RbacResult<bool> {
            Ok(false)
        }
        async fn remove_all_for_role(&self, _role: &str) -> RbacResult<u64> {
            Ok(0)
        }
        async fn policies_for_role(&self, _role: &str) -> RbacResult<Vec<PolicyRule>> {
            Ok(Vec::new())
        }
        async fn load_all(&self) -> RbacResult<Vec<PolicyRule>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn blank_tuples_fail_before_reaching_the_store() {
        let store = Arc::new(CountingStore::default());
        let admin = RoleAdmin::new(store.clone(), Arc::new(LocalDecisionCache::default()), "super");
        let report = admin
            .grant_permissions(
                "editor",
                &[
                    PolicyRule::new("editor", "", "GET"),
                    PolicyRule::new("editor", "/admin/rules/list", " "),
                    PolicyRule::new("editor", "/admin/roles/list", "POST"),
                ],
            )
            .await
            .expect("grant");
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].error.contains("path is empty"));
        assert!(report.failures[1].error.contains("method is empty"));
        assert_eq!(report.granted.len(), 1);
        assert_eq!(store.writes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_grant_keeps_successful_tuples() {
        let store = Arc::new(PickyStore {
            inner: InMemoryPolicyStore::new(),
            rejected_path: "/admin/roles/add",
        });
        let cache = Arc::new(LocalDecisionCache::default());
        let admin = RoleAdmin::new(store.clone(), cache, "super");
        let report = admin
            .grant_permissions(
                "editor",
                &[
                    PolicyRule::new("editor", "/admin/roles/list", "POST"),
                    PolicyRule::new("editor", "/admin/roles/add", "POST"),
                ],
            )
            .await
            .expect("grant");
        assert_eq!(report.granted.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule.path, "/admin/roles/add");
        assert_eq!(store.inner.len().await, 1);
    }

    #[tokio::test]
    async fn revoke_after_cached_allow_denies() {
        let h = harness(vec![PolicyRule::new("editor", "/admin/roles/list", "POST")]);
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        assert!(h
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict")
            .allowed);

        let report = h.admin.revoke_permissions("editor").await.expect("revoke");
        assert_eq!(report.revoked.len(), 1);

        let verdict = h
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(!verdict.allowed);
    }

    #[tokio::test]
    async fn revoke_leaves_other_roles_cached() {
        let h = harness(vec![
            PolicyRule::new("editor", "/admin/roles/list", "POST"),
            PolicyRule::new("viewer", "/admin/roles/list", "POST"),
        ]);
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        h.authorizer
            .authorize(Some(&Identity::new(3, "viewer")), &resource)
            .await
            .expect("verdict");

        h.admin.revoke_permissions("editor").await.expect("revoke");

        let key = DecisionKey::new("viewer", "/admin/roles/list", "POST");
        assert_eq!(h.cache.get(&key).await.expect("get"), Some(true));
    }

    #[tokio::test]
    async fn replace_swaps_permission_set() {
        let h = harness(vec![PolicyRule::new("editor", "/admin/roles/list", "POST")]);
        let report = h
            .admin
            .replace_permissions(
                "editor",
                &[PolicyRule::new("editor", "/admin/menu/list", "POST")],
            )
            .await
            .expect("replace");
        assert_eq!(report.revoke.revoked.len(), 1);
        assert_eq!(report.grant.granted.len(), 1);
        let rules = h.store.policies_for_role("editor").await.expect("list");
        assert_eq!(rules, vec![PolicyRule::new("editor", "/admin/menu/list", "POST")]);
    }

    #[tokio::test]
    async fn delete_role_removes_tuples_and_cached_verdicts() {
        let h = harness(vec![
            PolicyRule::new("editor", "/admin/roles/list", "POST"),
            PolicyRule::new("editor", "/admin/menu/list", "POST"),
        ]);
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        h.authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");

        assert_eq!(h.admin.delete_role("editor").await.expect("delete"), 2);
        let verdict = h
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, VerdictReason::Evaluated);
    }

    #[tokio::test]
    async fn super_role_mutations_are_rejected_without_store_changes() {
        let h = harness(vec![PolicyRule::new("super", "/admin/roles/list", "POST")]);

        let err = h.admin.delete_role("super").await.expect_err("protected");
        assert!(matches!(err, RbacError::ProtectedRole(_)));
        assert!(err.is_guard_violation());
        assert!(h
            .admin
            .revoke_permissions("super")
            .await
            .expect_err("protected")
            .is_guard_violation());
        assert!(h
            .admin
            .grant_permissions("super", &[PolicyRule::new("super", "/a", "GET")])
            .await
            .expect_err("protected")
            .is_guard_violation());
        assert!(h
            .admin
            .replace_permissions("super", &[])
            .await
            .expect_err("protected")
            .is_guard_violation());

        assert_eq!(h.store.len().await, 1);
    }
}
