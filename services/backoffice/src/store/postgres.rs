//! Postgres-backed back-office store.
//!
//! # What this module is
//! Implements [`BackofficeStore`] and [`bastion_rbac::PolicyStore`] over one
//! `sqlx` pool. Permission tuples live in `casbin_rule` as
//! `(ptype = 'p', v0 = role, v1 = path, v2 = method)` with a unique index over
//! all four columns, so re-adding a tuple is a no-op.
//!
//! # Operational notes
//! - Migrations run at connect time via `sqlx::migrate!("./migrations")`.
//! - The super role, default menu rules and the initial administrator are
//!   seeded idempotently after migrations.
//! - The pool has explicit connect and acquire timeouts; handlers fail fast
//!   instead of hanging on an unavailable database.
//!
//! # Security notes
//! - Database URLs may contain credentials; they are never logged.
//! - All statements are static SQL with bound parameters.
use super::{
    AdminAccount, AdminUpdate, BackofficeStore, ListQuery, NewAdmin, NewRole, Page, Role,
    StoreError, StoreResult,
};
use crate::config::PostgresConfig;
use async_trait::async_trait;
use bastion_rbac::{POLICY_TYPE, PolicyRule, PolicyStore, RbacError, RbacResult, RuleNode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Durable store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use backoffice::config::PostgresConfig;
/// use backoffice::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg, "super").await;
/// }
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct DbRole {
    id: i64,
    name: String,
    alias: String,
    description: String,
}

impl From<DbRole> for Role {
    fn from(row: DbRole) -> Self {
        Role {
            id: row.id,
            name: row.name,
            alias: row.alias,
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbRule {
    id: i64,
    name: String,
    path: String,
    method: String,
    pid: i64,
}

impl From<DbRule> for RuleNode {
    fn from(row: DbRule) -> Self {
        RuleNode::new(
            row.id.max(0) as u64,
            row.pid.max(0) as u64,
            row.name,
            row.path,
            row.method,
        )
    }
}

#[derive(Debug, FromRow)]
struct DbAdmin {
    id: i64,
    username: String,
    nickname: String,
    department: String,
    role_alias: String,
    enabled: bool,
}

impl From<DbAdmin> for AdminAccount {
    fn from(row: DbAdmin) -> Self {
        AdminAccount {
            id: row.id,
            username: row.username,
            nickname: row.nickname,
            department: row.department,
            role: row.role_alias,
            enabled: row.enabled,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbPolicy {
    v0: String,
    v1: String,
    v2: String,
}

impl From<DbPolicy> for PolicyRule {
    fn from(row: DbPolicy) -> Self {
        PolicyRule::new(row.v0, row.v1, row.v2)
    }
}

fn policy_error(err: sqlx::Error) -> RbacError {
    RbacError::Store(err.into())
}

impl PostgresStore {
    /// Connect, run migrations and seed the built-in rows.
    ///
    /// # Errors
    /// - Connection, migration or seeding failures.
    pub async fn connect(pg: &PostgresConfig, super_role: &str) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), pool)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow::anyhow!("postgres connect timed out")))??;

        sqlx::migrate!("./migrations").run(&pool).await?;
        let store = Self { pool };
        store.seed(super_role).await?;
        Ok(store)
    }

    async fn seed(&self, super_role: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO roles (name, alias, description) VALUES ($1, $2, $3) \
             ON CONFLICT (alias) DO NOTHING",
        )
        .bind("Super administrator")
        .bind(super_role)
        .bind("Unrestricted access")
        .execute(&mut *tx)
        .await?;
        for rule in bastion_rbac::default_rules() {
            sqlx::query(
                "INSERT INTO menu_rules (id, name, path, method, pid) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(rule.id as i64)
            .bind(&rule.name)
            .bind(&rule.path)
            .bind(&rule.method)
            .bind(rule.pid as i64)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO admins (username, nickname, department, role_alias) \
             VALUES ('admin', 'Administrator', 'Administration', $1) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(super_role)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl BackofficeStore for PostgresStore {
    async fn list_roles(&self, query: &ListQuery) -> StoreResult<Page<Role>> {
        let alias = query.filter_value("alias");
        let name = query.filter_value("name");
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM roles \
             WHERE ($1::text IS NULL OR alias ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')",
        )
        .bind(alias)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<DbRole> = sqlx::query_as(
            "SELECT id, name, alias, description FROM roles \
             WHERE ($1::text IS NULL OR alias ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
             ORDER BY id LIMIT $3 OFFSET $4",
        )
        .bind(alias)
        .bind(name)
        .bind(i64::from(query.page_size))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            items: rows.into_iter().map(Role::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn all_roles(&self) -> StoreResult<Vec<Role>> {
        let rows: Vec<DbRole> =
            sqlx::query_as("SELECT id, name, alias, description FROM roles ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn get_role(&self, id: i64) -> StoreResult<Role> {
        let row: Option<DbRole> =
            sqlx::query_as("SELECT id, name, alias, description FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Role::from)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn get_role_by_alias(&self, alias: &str) -> StoreResult<Role> {
        let row: Option<DbRole> =
            sqlx::query_as("SELECT id, name, alias, description FROM roles WHERE alias = $1")
                .bind(alias)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Role::from)
            .ok_or_else(|| StoreError::NotFound(format!("role {alias}")))
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        let row: Option<DbRole> = sqlx::query_as(
            "INSERT INTO roles (name, alias, description) VALUES ($1, $2, $3) \
             ON CONFLICT (alias) DO NOTHING \
             RETURNING id, name, alias, description",
        )
        .bind(&role.name)
        .bind(&role.alias)
        .bind(&role.description)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Role::from)
            .ok_or_else(|| StoreError::Conflict(format!("role alias {}", role.alias)))
    }

    async fn update_role(&self, id: i64, name: &str, description: &str) -> StoreResult<Role> {
        let row: Option<DbRole> = sqlx::query_as(
            "UPDATE roles SET name = $2, description = $3 WHERE id = $1 \
             RETURNING id, name, alias, description",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Role::from)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn delete_role(&self, alias: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE alias = $1")
            .bind(alias)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("role {alias}")));
        }
        Ok(())
    }

    async fn list_rules(&self) -> StoreResult<Vec<RuleNode>> {
        let rows: Vec<DbRule> =
            sqlx::query_as("SELECT id, name, path, method, pid FROM menu_rules ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(RuleNode::from).collect())
    }

    async fn rules_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<RuleNode>> {
        let ids: Vec<i64> = ids.iter().map(|id| *id as i64).collect();
        let rows: Vec<DbRule> = sqlx::query_as(
            "SELECT id, name, path, method, pid FROM menu_rules WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RuleNode::from).collect())
    }

    async fn list_admins(&self, query: &ListQuery) -> StoreResult<Page<AdminAccount>> {
        let username = query.filter_value("username");
        let role = query.filter_value("role");
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM admins \
             WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR role_alias = $2)",
        )
        .bind(username)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<DbAdmin> = sqlx::query_as(
            "SELECT id, username, nickname, department, role_alias, enabled FROM admins \
             WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%') \
               AND ($2::text IS NULL OR role_alias = $2) \
             ORDER BY id LIMIT $3 OFFSET $4",
        )
        .bind(username)
        .bind(role)
        .bind(i64::from(query.page_size))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(Page {
            items: rows.into_iter().map(AdminAccount::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn get_admin(&self, id: i64) -> StoreResult<AdminAccount> {
        let row: Option<DbAdmin> = sqlx::query_as(
            "SELECT id, username, nickname, department, role_alias, enabled FROM admins \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AdminAccount::from)
            .ok_or_else(|| StoreError::NotFound(format!("admin {id}")))
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<AdminAccount> {
        let row: Option<DbAdmin> = sqlx::query_as(
            "INSERT INTO admins (username, nickname, department, role_alias) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING id, username, nickname, department, role_alias, enabled",
        )
        .bind(&admin.username)
        .bind(&admin.nickname)
        .bind(&admin.department)
        .bind(&admin.role)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AdminAccount::from)
            .ok_or_else(|| StoreError::Conflict(format!("admin username {}", admin.username)))
    }

    async fn update_admin(&self, id: i64, update: AdminUpdate) -> StoreResult<AdminAccount> {
        let row: Option<DbAdmin> = sqlx::query_as(
            "UPDATE admins SET \
                 nickname = COALESCE($2, nickname), \
                 department = COALESCE($3, department), \
                 role_alias = COALESCE($4, role_alias), \
                 enabled = COALESCE($5, enabled) \
             WHERE id = $1 \
             RETURNING id, username, nickname, department, role_alias, enabled",
        )
        .bind(id)
        .bind(update.nickname)
        .bind(update.department)
        .bind(update.role)
        .bind(update.enabled)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AdminAccount::from)
            .ok_or_else(|| StoreError::NotFound(format!("admin {id}")))
    }

    async fn delete_admin(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("admin {id}")));
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl PolicyStore for PostgresStore {
    async fn add_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
        rule.validate()?;
        let result = sqlx::query(
            "INSERT INTO casbin_rule (ptype, v0, v1, v2) VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING",
        )
        .bind(POLICY_TYPE)
        .bind(&rule.role)
        .bind(&rule.path)
        .bind(&rule.method)
        .execute(&self.pool)
        .await
        .map_err(policy_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> RbacResult<bool> {
        let result = sqlx::query(
            "DELETE FROM casbin_rule WHERE ptype = $1 AND v0 = $2 AND v1 = $3 AND v2 = $4",
        )
        .bind(POLICY_TYPE)
        .bind(&rule.role)
        .bind(&rule.path)
        .bind(&rule.method)
        .execute(&self.pool)
        .await
        .map_err(policy_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_all_for_role(&self, role: &str) -> RbacResult<u64> {
        let result = sqlx::query("DELETE FROM casbin_rule WHERE ptype = $1 AND v0 = $2")
            .bind(POLICY_TYPE)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(policy_error)?;
        Ok(result.rows_affected())
    }

    async fn policies_for_role(&self, role: &str) -> RbacResult<Vec<PolicyRule>> {
        let rows: Vec<DbPolicy> = sqlx::query_as(
            "SELECT v0, v1, v2 FROM casbin_rule WHERE ptype = $1 AND v0 = $2 ORDER BY id",
        )
        .bind(POLICY_TYPE)
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(policy_error)?;
        Ok(rows.into_iter().map(PolicyRule::from).collect())
    }

    async fn load_all(&self) -> RbacResult<Vec<PolicyRule>> {
        let rows: Vec<DbPolicy> =
            sqlx::query_as("SELECT v0, v1, v2 FROM casbin_rule WHERE ptype = $1 ORDER BY id")
                .bind(POLICY_TYPE)
                .fetch_all(&self.pool)
                .await
                .map_err(policy_error)?;
        Ok(rows.into_iter().map(PolicyRule::from).collect())
    }
}
