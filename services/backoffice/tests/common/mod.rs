use backoffice::app::{AppState, build_router};
use backoffice::auth::token::mint_token;
use backoffice::store::memory::InMemoryStore;
use bastion_rbac::{CacheConfig, InMemoryPolicyStore};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &str = "integration-secret";
pub const SUPER_ROLE: &str = "super";

pub type App = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub async fn memory_state() -> AppState {
    AppState::assemble(
        Arc::new(InMemoryStore::new(SUPER_ROLE)),
        Arc::new(InMemoryPolicyStore::new()),
        SECRET,
        SUPER_ROLE,
        &CacheConfig::default(),
    )
    .await
    .expect("state")
}

pub async fn memory_app() -> (App, AppState) {
    let state = memory_state().await;
    (build_router(state.clone()).into_service(), state)
}

pub fn token_for(subject_id: u64, role: &str) -> String {
    mint_token(SECRET, subject_id, role, Duration::from_secs(300)).expect("token")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
