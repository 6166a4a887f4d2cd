//! Admin account endpoints.
//!
//! # Key invariants
//! - An administrator can never delete their own account.
//! - An account's role alias always names an existing role.
use crate::api::error::{ApiError, api_store_error, api_validation_error};
use crate::api::types::{
    AdminCreateRequest, AdminListRequest, AdminListResponse, AdminUpdateRequest,
};
use crate::app::AppState;
use crate::store::{AdminAccount, AdminUpdate, ListQuery, NewAdmin, StoreError};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use bastion_rbac::Identity;

#[utoipa::path(
    post,
    path = "/admin/admin/list",
    tag = "admins",
    request_body = AdminListRequest,
    responses((status = 200, body = AdminListResponse))
)]
pub async fn list_admins(
    State(state): State<AppState>,
    Json(body): Json<AdminListRequest>,
) -> Result<Json<AdminListResponse>, ApiError> {
    let query = ListQuery::new(body.page_num, body.page_size)
        .filter("username", body.username)
        .filter("role", body.role);
    let page = state
        .store
        .list_admins(&query)
        .await
        .map_err(|err| api_store_error("failed to list admins", err))?;
    Ok(Json(AdminListResponse {
        total: page.total,
        data: page.items,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/admin/info/{id}",
    tag = "admins",
    params(("id" = i64, Path, description = "Admin account id")),
    responses((status = 200, body = AdminAccount), (status = 404))
)]
pub async fn admin_info(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AdminAccount>, ApiError> {
    let admin = state
        .store
        .get_admin(id)
        .await
        .map_err(|err| api_store_error("failed to load admin", err))?;
    Ok(Json(admin))
}

async fn ensure_role_exists(state: &AppState, alias: &str) -> Result<(), ApiError> {
    match state.store.get_role_by_alias(alias).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(api_validation_error(&format!(
            "role {alias} does not exist"
        ))),
        Err(err) => Err(api_store_error("failed to load role", err)),
    }
}

#[utoipa::path(
    post,
    path = "/admin/admin/add",
    tag = "admins",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, body = AdminAccount),
        (status = 400),
        (status = 409)
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    Json(body): Json<AdminCreateRequest>,
) -> Result<(StatusCode, Json<AdminAccount>), ApiError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(api_validation_error("username is required"));
    }
    let role = body.role.trim();
    ensure_role_exists(&state, role).await?;
    let admin = state
        .store
        .create_admin(NewAdmin {
            username: username.to_string(),
            nickname: body.nickname,
            department: body.department,
            role: role.to_string(),
        })
        .await
        .map_err(|err| api_store_error("failed to create admin", err))?;
    tracing::info!(admin_id = admin.id, role = %admin.role, "admin created");
    Ok((StatusCode::CREATED, Json(admin)))
}

#[utoipa::path(
    put,
    path = "/admin/admin/edit/{id}",
    tag = "admins",
    params(("id" = i64, Path, description = "Admin account id")),
    request_body = AdminUpdateRequest,
    responses((status = 200, body = AdminAccount), (status = 400), (status = 404))
)]
pub async fn update_admin(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AdminUpdateRequest>,
) -> Result<Json<AdminAccount>, ApiError> {
    let role = body.role.map(|role| role.trim().to_string());
    if let Some(role) = &role {
        ensure_role_exists(&state, role).await?;
    }
    let admin = state
        .store
        .update_admin(
            id,
            AdminUpdate {
                nickname: body.nickname,
                department: body.department,
                role,
                enabled: body.enabled,
            },
        )
        .await
        .map_err(|err| api_store_error("failed to update admin", err))?;
    tracing::info!(admin_id = admin.id, role = %admin.role, "admin updated");
    Ok(Json(admin))
}

#[utoipa::path(
    delete,
    path = "/admin/admin/delete/{id}",
    tag = "admins",
    params(("id" = i64, Path, description = "Admin account id")),
    responses((status = 204), (status = 400), (status = 404))
)]
pub async fn delete_admin(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    if u64::try_from(id).ok() == Some(identity.subject_id) {
        return Err(api_validation_error("cannot delete your own account"));
    }
    state
        .store
        .delete_admin(id)
        .await
        .map_err(|err| api_store_error("failed to delete admin", err))?;
    tracing::info!(admin_id = id, deleted_by = identity.subject_id, "admin deleted");
    Ok(StatusCode::NO_CONTENT)
}
