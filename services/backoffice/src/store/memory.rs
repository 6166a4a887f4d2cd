//! In-memory back-office store.
//!
//! # Purpose
//! Keeps roles, menu rules and admin accounts in `BTreeMap`s guarded by
//! `tokio::sync::RwLock`. Seeded on construction with the super role, the
//! default menu rules and one super-role administrator.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - Each mutation holds the write lock of the map it touches.
use super::{
    AdminAccount, AdminUpdate, BackofficeStore, ListQuery, NewAdmin, NewRole, Page, Role,
    StoreError, StoreResult,
};
use async_trait::async_trait;
use bastion_rbac::{RuleNode, default_rules};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryStore {
    roles: Arc<RwLock<BTreeMap<i64, Role>>>,
    rules: Arc<RwLock<BTreeMap<u64, RuleNode>>>,
    admins: Arc<RwLock<BTreeMap<i64, AdminAccount>>>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T: Clone>(matching: Vec<T>, query: &ListQuery) -> Page<T> {
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.page_size as usize)
        .collect();
    Page { items, total }
}

impl InMemoryStore {
    pub fn new(super_role: &str) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(
            1,
            Role {
                id: 1,
                name: "Super administrator".to_string(),
                alias: super_role.to_string(),
                description: "Unrestricted access".to_string(),
            },
        );
        let rules = default_rules()
            .into_iter()
            .map(|rule| (rule.id, rule))
            .collect();
        let mut admins = BTreeMap::new();
        admins.insert(
            1,
            AdminAccount {
                id: 1,
                username: "admin".to_string(),
                nickname: "Administrator".to_string(),
                department: "Administration".to_string(),
                role: super_role.to_string(),
                enabled: true,
            },
        );
        Self {
            roles: Arc::new(RwLock::new(roles)),
            rules: Arc::new(RwLock::new(rules)),
            admins: Arc::new(RwLock::new(admins)),
        }
    }
}

#[async_trait]
impl BackofficeStore for InMemoryStore {
    async fn list_roles(&self, query: &ListQuery) -> StoreResult<Page<Role>> {
        let roles = self.roles.read().await;
        let matching: Vec<Role> = roles
            .values()
            .filter(|role| {
                query
                    .filter_value("alias")
                    .map_or(true, |needle| contains_ci(&role.alias, needle))
                    && query
                        .filter_value("name")
                        .map_or(true, |needle| contains_ci(&role.name, needle))
            })
            .cloned()
            .collect();
        Ok(paginate(matching, query))
    }

    async fn all_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.roles.read().await.values().cloned().collect())
    }

    async fn get_role(&self, id: i64) -> StoreResult<Role> {
        self.roles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn get_role_by_alias(&self, alias: &str) -> StoreResult<Role> {
        self.roles
            .read()
            .await
            .values()
            .find(|role| role.alias == alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("role {alias}")))
    }

    async fn create_role(&self, role: NewRole) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| existing.alias == role.alias) {
            return Err(StoreError::Conflict(format!("role alias {}", role.alias)));
        }
        let id = roles.keys().next_back().copied().unwrap_or(0) + 1;
        let created = Role {
            id,
            name: role.name,
            alias: role.alias,
            description: role.description,
        };
        roles.insert(id, created.clone());
        Ok(created)
    }

    async fn update_role(&self, id: i64, name: &str, description: &str) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))?;
        role.name = name.to_string();
        role.description = description.to_string();
        Ok(role.clone())
    }

    async fn delete_role(&self, alias: &str) -> StoreResult<()> {
        let mut roles = self.roles.write().await;
        let before = roles.len();
        roles.retain(|_, role| role.alias != alias);
        if roles.len() == before {
            return Err(StoreError::NotFound(format!("role {alias}")));
        }
        Ok(())
    }

    async fn list_rules(&self) -> StoreResult<Vec<RuleNode>> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn rules_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<RuleNode>> {
        let rules = self.rules.read().await;
        Ok(ids.iter().filter_map(|id| rules.get(id).cloned()).collect())
    }

    async fn list_admins(&self, query: &ListQuery) -> StoreResult<Page<AdminAccount>> {
        let admins = self.admins.read().await;
        let matching: Vec<AdminAccount> = admins
            .values()
            .filter(|admin| {
                query
                    .filter_value("username")
                    .map_or(true, |needle| contains_ci(&admin.username, needle))
                    && query
                        .filter_value("role")
                        .map_or(true, |needle| admin.role == needle)
            })
            .cloned()
            .collect();
        Ok(paginate(matching, query))
    }

    async fn get_admin(&self, id: i64) -> StoreResult<AdminAccount> {
        self.admins
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("admin {id}")))
    }

    async fn create_admin(&self, admin: NewAdmin) -> StoreResult<AdminAccount> {
        let mut admins = self.admins.write().await;
        if admins
            .values()
            .any(|existing| existing.username == admin.username)
        {
            return Err(StoreError::Conflict(format!("admin username {}", admin.username)));
        }
        let id = admins.keys().next_back().copied().unwrap_or(0) + 1;
        let created = AdminAccount {
            id,
            username: admin.username,
            nickname: admin.nickname,
            department: admin.department,
            role: admin.role,
            enabled: true,
        };
        admins.insert(id, created.clone());
        Ok(created)
    }

    async fn update_admin(&self, id: i64, update: AdminUpdate) -> StoreResult<AdminAccount> {
        let mut admins = self.admins.write().await;
        let admin = admins
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("admin {id}")))?;
        if let Some(nickname) = update.nickname {
            admin.nickname = nickname;
        }
        if let Some(department) = update.department {
            admin.department = department;
        }
        if let Some(role) = update.role {
            admin.role = role;
        }
        if let Some(enabled) = update.enabled {
            admin.enabled = enabled;
        }
        Ok(admin.clone())
    }

    async fn delete_admin(&self, id: i64) -> StoreResult<()> {
        self.admins
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("admin {id}")))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
