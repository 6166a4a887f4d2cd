//! Health endpoint.
//!
//! # Key invariants
//! - Unauthenticated and side-effect free apart from a storage health check.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::HealthStatus;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Back-office health", body = HealthStatus)
    )
)]
/// Probe the backing store and report whether a policy snapshot is installed.
///
/// # Errors
/// - Returns 500 if the storage health check fails.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        storage: state.store.backend_name().to_string(),
        policy_loaded: state.authorizer.engine().is_loaded(),
    }))
}
