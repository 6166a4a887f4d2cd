//! Casbin-backed policy engine.
//!
//! # Purpose and responsibility
//! Answers "may role R call method M on path P" against the most recently
//! loaded snapshot of the policy store.
//!
//! # Key invariants and assumptions
//! - The super role is allowed without consulting the snapshot.
//! - A snapshot is an immutable Casbin enforcer; `load_policy` builds a new one
//!   and swaps it in, so readers never observe a half-loaded policy set.
//! - Every load takes a sequence number before reading the store. A load never
//!   replaces (or clears) a snapshot that began after it did, so overlapping
//!   reloads cannot roll the policy back.
//! - Fail-closed: with no snapshot (never loaded, or the last load failed)
//!   `enforce` returns [`RbacError::NotLoaded`], which every caller treats as deny.
//!
//! # Performance
//! `load_policy` rebuilds the whole enforcer from the store. Reload cost grows
//! with the number of tuples.
use crate::casbin_model::casbin_model;
use crate::errors::{RbacError, RbacResult};
use crate::store::PolicyStore;
use crate::types::{PolicyRule, RoleAlias};
use arc_swap::ArcSwapOption;
use casbin::{CoreApi, Enforcer, MemoryAdapter, MgmtApi};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Build an in-memory Casbin enforcer holding exactly `rules`.
///
/// # Errors
/// - Returns [`RbacError::Engine`] for an invalid model or a rejected rule.
///
/// # Example
/// ```rust
/// use bastion_rbac::{PolicyRule, build_enforcer};
/// use casbin::CoreApi;
///
/// # async fn build() -> bastion_rbac::RbacResult<()> {
/// let rules = vec![PolicyRule::new("editor", "/admin/roles/list", "POST")];
/// let enforcer = build_enforcer(&rules).await?;
/// assert!(enforcer.enforce(("editor", "/admin/roles/list", "POST"))?);
/// # Ok(())
/// # }
/// ```
pub async fn build_enforcer(rules: &[PolicyRule]) -> RbacResult<Enforcer> {
    let model = casbin_model().await?;
    let adapter = MemoryAdapter::default();
    let mut enforcer = Enforcer::new(model, adapter).await?;
    for rule in rules {
        enforcer
            .add_policy(vec![
                rule.role.clone(),
                rule.path.clone(),
                rule.method.clone(),
            ])
            .await?;
    }
    Ok(enforcer)
}

struct Snapshot {
    seq: u64,
    enforcer: Enforcer,
}

pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    super_role: RoleAlias,
    snapshot: ArcSwapOption<Snapshot>,
    load_seq: AtomicU64,
    enforce_calls: AtomicU64,
    load_calls: AtomicU64,
}

impl PolicyEngine {
    /// Create an engine with no snapshot; call [`PolicyEngine::load_policy`] before use.
    pub fn new(store: Arc<dyn PolicyStore>, super_role: impl Into<RoleAlias>) -> Self {
        Self {
            store,
            super_role: super_role.into(),
            snapshot: ArcSwapOption::const_empty(),
            load_seq: AtomicU64::new(0),
            enforce_calls: AtomicU64::new(0),
            load_calls: AtomicU64::new(0),
        }
    }

    pub fn super_role(&self) -> &RoleAlias {
        &self.super_role
    }

    pub fn is_super_role(&self, role: &str) -> bool {
        role == self.super_role.as_str()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Replace the in-memory snapshot with a fresh read of the policy store.
    ///
    /// # Errors
    /// - Store read failures and enforcer build failures. On error the previous
    ///   snapshot is dropped (unless a later load already replaced it) so
    ///   enforcement fails closed until a load succeeds.
    pub async fn load_policy(&self) -> RbacResult<()> {
        self.load_calls.fetch_add(1, Ordering::Relaxed);
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let loaded = async {
            let rules = self.store.load_all().await?;
            let enforcer = build_enforcer(&rules).await?;
            Ok::<_, RbacError>((rules.len(), enforcer))
        }
        .await;

        match loaded {
            Ok((count, enforcer)) => {
                let fresh = Arc::new(Snapshot { seq, enforcer });
                if self.install(seq, Some(fresh)) {
                    tracing::debug!(rules = count, seq, "policy snapshot installed");
                } else {
                    tracing::debug!(seq, "newer policy snapshot already installed");
                }
                metrics::histogram!("bastion_policy_load_seconds")
                    .record(started.elapsed().as_secs_f64());
                Ok(())
            }
            Err(err) => {
                self.install(seq, None);
                metrics::counter!("bastion_policy_load_failures_total").increment(1);
                tracing::error!(error = %err, "policy reload failed");
                Err(err)
            }
        }
    }

    /// Swap in `next` unless the current snapshot came from a later load.
    fn install(&self, seq: u64, next: Option<Arc<Snapshot>>) -> bool {
        let mut installed = false;
        self.snapshot.rcu(|current| match current {
            Some(existing) if existing.seq > seq => {
                installed = false;
                Some(existing.clone())
            }
            _ => {
                installed = true;
                next.clone()
            }
        });
        installed
    }

    /// Evaluate one `(role, path, method)` triple. Arguments are compared verbatim.
    pub fn enforce(&self, role: &str, path: &str, method: &str) -> RbacResult<bool> {
        if self.is_super_role(role) {
            return Ok(true);
        }
        self.enforce_calls.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.snapshot.load();
        let snapshot = snapshot.as_ref().ok_or(RbacError::NotLoaded)?;
        Ok(snapshot.enforcer.enforce((role, path, method))?)
    }

    /// Number of evaluations that reached the snapshot.
    pub fn enforce_calls(&self) -> u64 {
        self.enforce_calls.load(Ordering::Relaxed)
    }

    pub fn load_calls(&self) -> u64 {
        self.load_calls.load(Ordering::Relaxed)
    }
}
