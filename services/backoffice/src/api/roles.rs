//! Role administration endpoints.
//!
//! # Purpose and responsibility
//! CRUD over role records plus the permission tuples attached to them. Tuple
//! changes go through [`bastion_rbac::RoleAdmin`] so the decision cache is
//! invalidated before a response is sent.
//!
//! # Key invariants
//! - The super role can be listed and inspected but never edited or deleted.
//! - Only leaf menu rules become permission tuples.
use crate::api::error::{
    ApiError, api_rbac_error, api_store_error, api_validation_error,
};
use crate::api::types::{
    RoleCreateRequest, RoleDeleteResponse, RoleInfoResponse, RoleListRequest, RoleListResponse,
    RoleMutationResponse, RoleUpdateRequest,
};
use crate::app::AppState;
use crate::store::{ListQuery, NewRole, Role};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bastion_rbac::{PolicyRule, RuleFailure, RuleNode, grantable_rules};
use rand::Rng;

const GENERATED_ALIAS_LEN: usize = 10;
const ALIAS_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn generate_alias() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_ALIAS_LEN)
        .map(|_| ALIAS_ALPHABET[rng.gen_range(0..ALIAS_ALPHABET.len())] as char)
        .collect()
}

/// Menu rule ids matching the given tuples, ordered by id.
fn rule_ids_for(rules: &[PolicyRule], nodes: &[RuleNode]) -> Vec<u64> {
    let mut ids: Vec<u64> = nodes
        .iter()
        .filter(|node| node.is_grantable())
        .filter(|node| {
            rules
                .iter()
                .any(|rule| rule.path == node.path && rule.method == node.method)
        })
        .map(|node| node.id)
        .collect();
    ids.sort_unstable();
    ids
}

async fn grantable_for(
    state: &AppState,
    alias: &str,
    ids: &[u64],
) -> Result<(Vec<PolicyRule>, Vec<RuleNode>), ApiError> {
    let nodes = state
        .store
        .rules_by_ids(ids)
        .await
        .map_err(|err| api_store_error("failed to load menu rules", err))?;
    Ok((grantable_rules(alias, &nodes), nodes))
}

fn granted_ids(nodes: &[RuleNode], failures: &[RuleFailure]) -> Vec<u64> {
    nodes
        .iter()
        .filter(|node| node.is_grantable())
        .filter(|node| {
            !failures
                .iter()
                .any(|failure| failure.rule.path == node.path && failure.rule.method == node.method)
        })
        .map(|node| node.id)
        .collect()
}

#[utoipa::path(
    post,
    path = "/admin/roles/list",
    tag = "roles",
    request_body = RoleListRequest,
    responses((status = 200, body = RoleListResponse))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Json(body): Json<RoleListRequest>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let query = ListQuery::new(body.page_num, body.page_size)
        .filter("alias", body.alias)
        .filter("name", body.name);
    let page = state
        .store
        .list_roles(&query)
        .await
        .map_err(|err| api_store_error("failed to list roles", err))?;
    Ok(Json(RoleListResponse {
        total: page.total,
        data: page.items,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/roles/getAllRoles",
    tag = "roles",
    responses((status = 200, body = RoleListResponse))
)]
pub async fn all_roles(State(state): State<AppState>) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = state
        .store
        .all_roles()
        .await
        .map_err(|err| api_store_error("failed to list roles", err))?;
    Ok(Json(RoleListResponse {
        total: roles.len() as u64,
        data: roles,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/roles/info/{alias}",
    tag = "roles",
    params(("alias" = String, Path, description = "Role alias")),
    responses((status = 200, body = RoleInfoResponse), (status = 404))
)]
pub async fn role_info(
    Path(alias): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RoleInfoResponse>, ApiError> {
    let role = state
        .store
        .get_role_by_alias(&alias)
        .await
        .map_err(|err| api_store_error("failed to load role", err))?;
    let granted = state
        .authorizer
        .store()
        .policies_for_role(&role.alias)
        .await
        .map_err(|err| api_rbac_error("failed to load role permissions", &err))?;
    let nodes = state
        .store
        .list_rules()
        .await
        .map_err(|err| api_store_error("failed to load menu rules", err))?;
    Ok(Json(RoleInfoResponse {
        ids: rule_ids_for(&granted, &nodes),
        role,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/roles/add",
    tag = "roles",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, body = RoleMutationResponse),
        (status = 400),
        (status = 409)
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(body): Json<RoleCreateRequest>,
) -> Result<(StatusCode, Json<RoleMutationResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(api_validation_error("role name is required"));
    }
    let alias = body
        .alias
        .map(|alias| alias.trim().to_string())
        .filter(|alias| !alias.is_empty())
        .unwrap_or_else(generate_alias);
    if alias == state.role_admin.super_role().as_str() {
        return Err(api_validation_error("super role alias is reserved"));
    }
    let role = state
        .store
        .create_role(NewRole {
            name: body.name.trim().to_string(),
            alias,
            description: body.description,
        })
        .await
        .map_err(|err| api_store_error("failed to create role", err))?;

    let (ids, failures) = if body.ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let (rules, nodes) = grantable_for(&state, &role.alias, &body.ids).await?;
        let report = state
            .role_admin
            .grant_permissions(&role.alias, &rules)
            .await
            .map_err(|err| api_rbac_error("failed to grant permissions", &err))?;
        (granted_ids(&nodes, &report.failures), report.failures)
    };
    tracing::info!(alias = %role.alias, permissions = ids.len(), "role created");
    Ok((
        StatusCode::CREATED,
        Json(RoleMutationResponse { role, ids, failures }),
    ))
}

#[utoipa::path(
    put,
    path = "/admin/roles/edit/{id}",
    tag = "roles",
    params(("id" = i64, Path, description = "Role id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, body = RoleMutationResponse),
        (status = 400),
        (status = 404)
    )
)]
pub async fn update_role(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<RoleUpdateRequest>,
) -> Result<Json<RoleMutationResponse>, ApiError> {
    let existing: Role = state
        .store
        .get_role(id)
        .await
        .map_err(|err| api_store_error("failed to load role", err))?;
    if existing.alias == state.role_admin.super_role().as_str() {
        return Err(api_validation_error("the super role cannot be modified"));
    }
    if body.name.trim().is_empty() {
        return Err(api_validation_error("role name is required"));
    }
    if body.ids.is_empty() {
        return Err(api_validation_error("select at least one permission"));
    }
    let (rules, nodes) = grantable_for(&state, &existing.alias, &body.ids).await?;

    let role = state
        .store
        .update_role(id, body.name.trim(), &body.description)
        .await
        .map_err(|err| api_store_error("failed to update role", err))?;
    let report = state
        .role_admin
        .replace_permissions(&role.alias, &rules)
        .await
        .map_err(|err| api_rbac_error("failed to replace permissions", &err))?;

    let mut failures = report.revoke.failures;
    failures.extend(report.grant.failures);
    let ids = granted_ids(&nodes, &failures);
    tracing::info!(alias = %role.alias, permissions = ids.len(), "role updated");
    Ok(Json(RoleMutationResponse { role, ids, failures }))
}

#[utoipa::path(
    delete,
    path = "/admin/roles/delete/{alias}",
    tag = "roles",
    params(("alias" = String, Path, description = "Role alias")),
    responses(
        (status = 200, body = RoleDeleteResponse),
        (status = 400),
        (status = 404)
    )
)]
pub async fn delete_role(
    Path(alias): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RoleDeleteResponse>, ApiError> {
    state
        .store
        .get_role_by_alias(&alias)
        .await
        .map_err(|err| api_store_error("failed to load role", err))?;
    let removed_permissions = state
        .role_admin
        .delete_role(&alias)
        .await
        .map_err(|err| api_rbac_error("failed to delete role permissions", &err))?;
    state
        .store
        .delete_role(&alias)
        .await
        .map_err(|err| api_store_error("failed to delete role", err))?;
    tracing::info!(%alias, removed_permissions, "role deleted");
    Ok(Json(RoleDeleteResponse {
        alias,
        removed_permissions,
    }))
}
