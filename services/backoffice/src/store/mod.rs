//! Back-office persistence.
//!
//! # Purpose
//! [`BackofficeStore`] holds roles, menu rules and admin accounts. Permission
//! tuples live behind [`bastion_rbac::PolicyStore`]; the Postgres backend
//! implements both traits over one pool.
use async_trait::async_trait;
use bastion_rbac::RuleNode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod memory;
pub mod postgres;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub alias: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub alias: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AdminAccount {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub department: String,
    /// Alias of the account's role.
    pub role: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub username: String,
    pub nickname: String,
    pub department: String,
    pub role: String,
}

/// Partial account update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminUpdate {
    pub nickname: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub enabled: Option<bool>,
}

/// Paging and fuzzy filters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    /// Substring filters keyed by column (`alias`, `name`, `username`, ...).
    pub filters: Vec<(&'static str, String)>,
}

impl ListQuery {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.filter(|page| *page > 0).unwrap_or(1),
            page_size: page_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, column: &'static str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
            self.filters.push((column, value));
        }
        self
    }

    pub fn filter_value(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Unexpected(other.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BackofficeStore: Send + Sync {
    async fn list_roles(&self, query: &ListQuery) -> StoreResult<Page<Role>>;
    async fn all_roles(&self) -> StoreResult<Vec<Role>>;
    async fn get_role(&self, id: i64) -> StoreResult<Role>;
    async fn get_role_by_alias(&self, alias: &str) -> StoreResult<Role>;
    /// Fails with [`StoreError::Conflict`] when the alias is taken.
    async fn create_role(&self, role: NewRole) -> StoreResult<Role>;
    /// Updates name and description; the alias is immutable.
    async fn update_role(&self, id: i64, name: &str, description: &str) -> StoreResult<Role>;
    async fn delete_role(&self, alias: &str) -> StoreResult<()>;

    async fn list_rules(&self) -> StoreResult<Vec<RuleNode>>;
    async fn rules_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<RuleNode>>;

    async fn list_admins(&self, query: &ListQuery) -> StoreResult<Page<AdminAccount>>;
    async fn get_admin(&self, id: i64) -> StoreResult<AdminAccount>;
    /// New accounts start enabled. Fails with [`StoreError::Conflict`] when the
    /// username is taken.
    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<AdminAccount>;
    async fn update_admin(&self, id: i64, update: AdminUpdate) -> StoreResult<AdminAccount>;
    async fn delete_admin(&self, id: i64) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
