//! Per-request authorization pipeline.
//!
//! # Purpose and responsibility
//! Orchestrates identity check, super-role bypass, decision cache lookup,
//! policy reload and enforcement for a single request, in that order.
//!
//! # Where it fits
//! Constructed once at start-up and shared by the HTTP middleware and the
//! role administration handlers; there is no global enforcer or cache.
//!
//! # Key invariants
//! - Fail-closed: load or enforcement errors never produce an allow.
//! - A cache failure degrades to a miss, never to an allow.
//! - Denials are cached like allows; errors are not cached.
use crate::cache::{DecisionCache, DecisionKey};
use crate::engine::PolicyEngine;
use crate::errors::RbacError;
use crate::store::PolicyStore;
use crate::types::{Identity, ResourceDescriptor, RoleAlias};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    SuperRole,
    CacheHit,
    Evaluated,
}

impl VerdictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictReason::SuperRole => "super_role",
            VerdictReason::CacheHit => "cache_hit",
            VerdictReason::Evaluated => "evaluated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: VerdictReason,
}

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("request is not authenticated")]
    Unauthenticated,
    #[error("failed to load policy: {0}")]
    PolicyLoad(#[source] RbacError),
    #[error("failed to evaluate policy: {0}")]
    Enforcement(#[source] RbacError),
}

impl AuthorizeError {
    /// Load and enforcement failures surface as server errors.
    pub fn is_internal(&self) -> bool {
        !matches!(self, AuthorizeError::Unauthenticated)
    }
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn PolicyStore>,
    engine: Arc<PolicyEngine>,
    cache: Arc<dyn DecisionCache>,
}

impl Authorizer {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        engine: Arc<PolicyEngine>,
        cache: Arc<dyn DecisionCache>,
    ) -> Self {
        Self {
            store,
            engine,
            cache,
        }
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<dyn DecisionCache> {
        &self.cache
    }

    pub fn super_role(&self) -> &RoleAlias {
        self.engine.super_role()
    }

    /// Decide whether `identity` may access `resource`.
    ///
    /// # Errors
    /// - [`AuthorizeError::Unauthenticated`] when no valid identity is attached.
    /// - [`AuthorizeError::PolicyLoad`] / [`AuthorizeError::Enforcement`] when the
    ///   engine cannot produce a verdict; callers must deny.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        resource: &ResourceDescriptor,
    ) -> Result<Verdict, AuthorizeError> {
        let identity = match identity {
            Some(identity) if identity.is_valid() => identity,
            _ => {
                record_outcome("unauthenticated");
                return Err(AuthorizeError::Unauthenticated);
            }
        };
        let role = identity.role.as_str();

        if self.engine.is_super_role(role) {
            record_outcome("allow");
            return Ok(Verdict {
                allowed: true,
                reason: VerdictReason::SuperRole,
            });
        }

        let key = DecisionKey::new(role, resource.path.clone(), resource.method.clone());
        match self.cache.get(&key).await {
            Ok(Some(allowed)) => {
                metrics::counter!("bastion_decision_cache_hits_total").increment(1);
                record_outcome(if allowed { "allow" } else { "deny" });
                return Ok(Verdict {
                    allowed,
                    reason: VerdictReason::CacheHit,
                });
            }
            Ok(None) => {
                metrics::counter!("bastion_decision_cache_misses_total").increment(1);
            }
            Err(err) => {
                metrics::counter!("bastion_decision_cache_errors_total").increment(1);
                tracing::warn!(error = %err, role, "decision cache lookup failed; treating as miss");
            }
        }

        // Observed before the reload so a concurrent invalidation is detectable.
        let generation = self.cache.generation();

        if let Err(err) = self.engine.load_policy().await {
            record_outcome("error");
            tracing::error!(error = %err, role, path = %resource.path, "policy load failed");
            return Err(AuthorizeError::PolicyLoad(err));
        }

        let allowed = match self
            .engine
            .enforce(role, &resource.path, &resource.method)
        {
            Ok(allowed) => allowed,
            Err(err) => {
                record_outcome("error");
                tracing::error!(
                    error = %err,
                    role,
                    path = %resource.path,
                    method = %resource.method,
                    "policy enforcement failed"
                );
                return Err(AuthorizeError::Enforcement(err));
            }
        };

        self.fill(key, allowed, generation).await;
        record_outcome(if allowed { "allow" } else { "deny" });
        tracing::debug!(
            role,
            path = %resource.path,
            method = %resource.method,
            allowed,
            "policy evaluated"
        );
        Ok(Verdict {
            allowed,
            reason: VerdictReason::Evaluated,
        })
    }

    async fn fill(&self, key: DecisionKey, allowed: bool, generation: u64) {
        if let Err(err) = self.cache.set(key.clone(), allowed).await {
            tracing::warn!(error = %err, "decision cache write failed");
            return;
        }
        if self.cache.generation() != generation {
            // A policy mutation raced with this evaluation; the verdict may be stale.
            if let Err(err) = self.cache.invalidate(&key).await {
                tracing::warn!(error = %err, "decision cache discard failed");
            }
        }
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("bastion_authz_decisions_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalDecisionCache;
    use crate::errors::RbacResult;
    use crate::store::memory::InMemoryPolicyStore;
    use crate::types::PolicyRule;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        store: Arc<InMemoryPolicyStore>,
        engine: Arc<PolicyEngine>,
        cache: Arc<LocalDecisionCache>,
        authorizer: Authorizer,
    }

    fn fixture(rules: Vec<PolicyRule>) -> Fixture {
        let store = Arc::new(InMemoryPolicyStore::with_rules(rules));
        let engine = Arc::new(PolicyEngine::new(store.clone(), "super"));
        let cache = Arc::new(LocalDecisionCache::default());
        let authorizer = Authorizer::new(store.clone(), engine.clone(), cache.clone());
        Fixture {
            store,
            engine,
            cache,
            authorizer,
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl DecisionCache for BrokenCache {
        async fn get(&self, _key: &DecisionKey) -> RbacResult<Option<bool>> {
            Err(RbacError::Cache("backend down".to_string()))
        }
        async fn set(&self, _key: DecisionKey, _allowed: bool) -> RbacResult<()> {
            Err(RbacError::Cache("backend down".to_string()))
        }
        async fn invalidate(&self, _key: &DecisionKey) -> RbacResult<()> {
            Err(RbacError::Cache("backend down".to_string()))
        }
        async fn invalidate_role(&self, _role: &str) -> RbacResult<()> {
            Err(RbacError::Cache("backend down".to_string()))
        }
        async fn clear(&self) -> RbacResult<()> {
            Err(RbacError::Cache("backend down".to_string()))
        }
        fn generation(&self) -> u64 {
            0
        }
    }

    struct FlakyStore {
        inner: InMemoryPolicyStore,
        down: AtomicBool,
    }

    #[async_trait]
    impl PolicyStore for FlakyStore {
        async fn add_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
            self.inner.add_policy(rule).await
        }
        async fn remove_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
            self.inner.remove_policy(rule).await
        }
        async fn remove_all_for_role(&self, role: &str) -> RbacResult<u64> {
            self.inner.remove_all_for_role(role).await
        }
        async fn policies_for_role(&self, role: &str) -> RbacResult<Vec<PolicyRule>> {
            self.inner.policies_for_role(role).await
        }
        async fn load_all(&self) -> RbacResult<Vec<PolicyRule>> {
            if self.down.load(Ordering::SeqCst) {
                return Err(RbacError::Store(anyhow::anyhow!("connection refused")));
            }
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() {
        let fx = fixture(Vec::new());
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        let err = fx
            .authorizer
            .authorize(None, &resource)
            .await
            .expect_err("no identity");
        assert!(matches!(err, AuthorizeError::Unauthenticated));
        assert!(!err.is_internal());

        let anonymous = Identity::new(0, "editor");
        let err = fx
            .authorizer
            .authorize(Some(&anonymous), &resource)
            .await
            .expect_err("zero subject");
        assert!(matches!(err, AuthorizeError::Unauthenticated));
    }

    #[tokio::test]
    async fn super_role_bypasses_cache_and_engine() {
        let fx = fixture(Vec::new());
        let identity = Identity::new(1, "super");
        let resource = ResourceDescriptor::new("/admin/admin/delete/1", "DELETE");
        let verdict = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert_eq!(
            verdict,
            Verdict {
                allowed: true,
                reason: VerdictReason::SuperRole
            }
        );
        assert_eq!(fx.engine.load_calls(), 0);
    }

    #[tokio::test]
    async fn role_without_tuples_is_denied_and_denial_is_cached() {
        let fx = fixture(Vec::new());
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/admin/delete/1", "DELETE");

        let first = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(!first.allowed);
        assert_eq!(first.reason, VerdictReason::Evaluated);

        let second = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(!second.allowed);
        assert_eq!(second.reason, VerdictReason::CacheHit);
        assert_eq!(fx.engine.enforce_calls(), 1);
    }

    #[tokio::test]
    async fn second_request_hits_cache_without_engine() {
        let fx = fixture(vec![PolicyRule::new("editor", "/admin/roles/list", "POST")]);
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");

        let first = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(first.allowed);
        let calls = fx.engine.enforce_calls();
        let loads = fx.engine.load_calls();

        let second = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(second.allowed);
        assert_eq!(second.reason, VerdictReason::CacheHit);
        assert_eq!(fx.engine.enforce_calls(), calls);
        assert_eq!(fx.engine.load_calls(), loads);
    }

    #[tokio::test]
    async fn revoked_tuple_is_denied_after_invalidation() {
        let rule = PolicyRule::new("editor", "/admin/roles/list", "POST");
        let fx = fixture(vec![rule.clone()]);
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");
        assert!(fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict")
            .allowed);

        assert!(fx.store.remove_policy(&rule).await.expect("remove"));
        fx.cache
            .invalidate(&DecisionKey::from(&rule))
            .await
            .expect("invalidate");

        let verdict = fx
            .authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("verdict");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, VerdictReason::Evaluated);
    }

    #[tokio::test]
    async fn broken_cache_degrades_to_evaluation() {
        let store = Arc::new(InMemoryPolicyStore::with_rules([PolicyRule::new(
            "editor",
            "/admin/roles/list",
            "POST",
        )]));
        let engine = Arc::new(PolicyEngine::new(store.clone(), "super"));
        let authorizer = Authorizer::new(store, engine.clone(), Arc::new(BrokenCache));
        let identity = Identity::new(2, "editor");

        let allowed = authorizer
            .authorize(
                Some(&identity),
                &ResourceDescriptor::new("/admin/roles/list", "POST"),
            )
            .await
            .expect("verdict");
        assert!(allowed.allowed);
        let denied = authorizer
            .authorize(
                Some(&identity),
                &ResourceDescriptor::new("/admin/roles/add", "POST"),
            )
            .await
            .expect("verdict");
        assert!(!denied.allowed);
        assert_eq!(engine.enforce_calls(), 2);
    }

    #[tokio::test]
    async fn load_failure_is_an_internal_error_not_an_allow() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryPolicyStore::with_rules([PolicyRule::new(
                "editor",
                "/admin/roles/list",
                "POST",
            )]),
            down: AtomicBool::new(true),
        });
        let engine = Arc::new(PolicyEngine::new(store.clone(), "super"));
        let cache = Arc::new(LocalDecisionCache::default());
        let authorizer = Authorizer::new(store.clone(), engine, cache.clone());
        let identity = Identity::new(2, "editor");
        let resource = ResourceDescriptor::new("/admin/roles/list", "POST");

        let err = authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect_err("load failure");
        assert!(matches!(err, AuthorizeError::PolicyLoad(_)));
        assert!(err.is_internal());
        let key = DecisionKey::new("editor", "/admin/roles/list", "POST");
        assert_eq!(cache.get(&key).await.expect("get"), None);

        store.down.store(false, Ordering::SeqCst);
        let verdict = authorizer
            .authorize(Some(&identity), &resource)
            .await
            .expect("recovered");
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn fill_discards_verdict_when_generation_moved() {
        let fx = fixture(Vec::new());
        let key = DecisionKey::new("editor", "/admin/roles/list", "POST");
        let stale_generation = fx.cache.generation();
        fx.cache.invalidate_role("editor").await.expect("invalidate");
        fx.authorizer.fill(key.clone(), true, stale_generation).await;
        assert_eq!(fx.cache.get(&key).await.expect("get"), None);
    }
}
