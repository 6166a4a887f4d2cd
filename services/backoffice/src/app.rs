//! Back-office HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Every `/admin` route is wrapped in `authenticate` then `authorize`; the
//! health check and API docs are public.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth::middleware::{authenticate, authorize};
use crate::auth::token::TokenVerifier;
use crate::store::BackofficeStore;
use anyhow::Context;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use bastion_rbac::{
    Authorizer, CacheConfig, DecisionCache, LocalDecisionCache, PolicyEngine, PolicyStore,
    RoleAdmin, RoleAlias,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BackofficeStore>,
    pub authorizer: Authorizer,
    pub role_admin: RoleAdmin,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the authorizer and role admin over shared policy and cache handles,
    /// then load the initial policy snapshot.
    ///
    /// # Errors
    /// - The signing secret is empty.
    /// - The initial policy load fails.
    pub async fn assemble(
        store: Arc<dyn BackofficeStore>,
        policies: Arc<dyn PolicyStore>,
        jwt_secret: &str,
        super_role: &str,
        cache: &CacheConfig,
    ) -> anyhow::Result<Self> {
        let super_role = RoleAlias::new(super_role);
        let cache: Arc<dyn DecisionCache> = Arc::new(LocalDecisionCache::new(cache));
        let engine = Arc::new(PolicyEngine::new(policies.clone(), super_role.clone()));
        engine
            .load_policy()
            .await
            .context("initial policy load")?;
        let tokens = TokenVerifier::new(jwt_secret).context("token verifier")?;
        Ok(Self {
            store,
            authorizer: Authorizer::new(policies.clone(), engine, cache.clone()),
            role_admin: RoleAdmin::new(policies, cache, super_role),
            tokens: Arc::new(tokens),
        })
    }
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/admin/list", post(api::admins::list_admins))
        .route("/admin/admin/add", post(api::admins::create_admin))
        .route("/admin/admin/edit/:id", put(api::admins::update_admin))
        .route("/admin/admin/info/:id", get(api::admins::admin_info))
        .route("/admin/admin/delete/:id", delete(api::admins::delete_admin))
        .route("/admin/roles/list", post(api::roles::list_roles))
        .route("/admin/roles/getAllRoles", get(api::roles::all_roles))
        .route("/admin/roles/info/:alias", get(api::roles::role_info))
        .route("/admin/roles/add", post(api::roles::create_role))
        .route("/admin/roles/edit/:id", put(api::roles::update_role))
        .route("/admin/roles/delete/:alias", delete(api::roles::delete_role))
        .route("/admin/rules/list", get(api::rules::list_rules))
        .route_layer(from_fn_with_state(state.clone(), authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .merge(admin_routes(&state))
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use bastion_rbac::InMemoryPolicyStore;

    #[tokio::test]
    async fn assemble_loads_policy_snapshot() {
        let state = AppState::assemble(
            Arc::new(InMemoryStore::new("super")),
            Arc::new(InMemoryPolicyStore::new()),
            "secret",
            "super",
            &CacheConfig::default(),
        )
        .await
        .expect("state");
        assert!(state.authorizer.engine().is_loaded());
        assert_eq!(state.role_admin.super_role().as_str(), "super");
    }

    #[tokio::test]
    async fn assemble_rejects_empty_secret() {
        let err = AppState::assemble(
            Arc::new(InMemoryStore::new("super")),
            Arc::new(InMemoryPolicyStore::new()),
            "",
            "super",
            &CacheConfig::default(),
        )
        .await
        .err()
        .expect("empty secret");
        assert!(err.to_string().contains("token verifier"));
    }
}
