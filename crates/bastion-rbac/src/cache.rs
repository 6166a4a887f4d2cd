//! Decision cache in front of the policy engine.
//!
//! # Purpose
//! Memoizes verdicts per `(role, path, method)` so repeated requests skip the
//! reload-and-enforce path.
//!
//! # Key invariants
//! - Eviction is equivalent to a miss; the engine stays the source of truth.
//! - Every invalidation bumps [`DecisionCache::generation`] *before* removing
//!   entries. A filler that observed an older generation discards its own
//!   write, so a verdict computed from a pre-mutation snapshot cannot outlive
//!   the mutation.
//! - The cache is a dedicated instance; keys never collide with other caches.
use crate::errors::RbacResult;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub role: String,
    pub path: String,
    pub method: String,
}

impl DecisionKey {
    pub fn new(role: impl Into<String>, path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            path: path.into(),
            method: method.into(),
        }
    }
}

impl From<&crate::types::PolicyRule> for DecisionKey {
    fn from(rule: &crate::types::PolicyRule) -> Self {
        Self::new(rule.role.clone(), rule.path.clone(), rule.method.clone())
    }
}

#[async_trait]
pub trait DecisionCache: Send + Sync {
    async fn get(&self, key: &DecisionKey) -> RbacResult<Option<bool>>;
    async fn set(&self, key: DecisionKey, allowed: bool) -> RbacResult<()>;
    async fn invalidate(&self, key: &DecisionKey) -> RbacResult<()>;
    /// Drop every entry whose key embeds `role`.
    async fn invalidate_role(&self, role: &str) -> RbacResult<()>;
    async fn clear(&self) -> RbacResult<()>;
    /// Monotonic counter advanced by every invalidation.
    fn generation(&self) -> u64;
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub time_to_live: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live: None,
        }
    }
}

/// Process-local decision cache backed by `moka`.
pub struct LocalDecisionCache {
    entries: Cache<DecisionKey, bool>,
    generation: AtomicU64,
}

impl LocalDecisionCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .support_invalidation_closures();
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for LocalDecisionCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[async_trait]
impl DecisionCache for LocalDecisionCache {
    async fn get(&self, key: &DecisionKey) -> RbacResult<Option<bool>> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: DecisionKey, allowed: bool) -> RbacResult<()> {
        self.entries.insert(key, allowed).await;
        Ok(())
    }

    async fn invalidate(&self, key: &DecisionKey) -> RbacResult<()> {
        self.bump();
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn invalidate_role(&self, role: &str) -> RbacResult<()> {
        self.bump();
        let role = role.to_string();
        if let Err(err) = self
            .entries
            .invalidate_entries_if(move |key, _| key.role == role)
        {
            // Fall back to the stronger full clear.
            tracing::warn!(error = %err, "role invalidation predicate rejected; clearing cache");
            self.entries.invalidate_all();
        }
        Ok(())
    }

    async fn clear(&self) -> RbacResult<()> {
        self.bump();
        self.entries.invalidate_all();
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
