//! Menu rule endpoints.
use crate::api::error::{ApiError, api_store_error};
use crate::api::types::RuleTreeResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use bastion_rbac::build_tree;

#[utoipa::path(
    get,
    path = "/admin/rules/list",
    tag = "rules",
    responses((status = 200, description = "Menu rules grouped under their parents", body = RuleTreeResponse))
)]
pub async fn list_rules(State(state): State<AppState>) -> Result<Json<RuleTreeResponse>, ApiError> {
    let rules = state
        .store
        .list_rules()
        .await
        .map_err(|err| api_store_error("failed to list rules", err))?;
    Ok(Json(RuleTreeResponse {
        data: build_tree(&rules),
    }))
}
