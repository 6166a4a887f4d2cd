//! Bastion back-office HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the RBAC authorizer and HTTP routers, then
//! starts the admin API server and the metrics listener.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use backoffice::app::{AppState, build_router};
use backoffice::config::{BackofficeConfig, StorageBackend};
use backoffice::observability;
use backoffice::store::BackofficeStore;
use backoffice::store::memory::InMemoryStore;
use backoffice::store::postgres::PostgresStore;
use bastion_rbac::{InMemoryPolicyStore, PolicyStore};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BackofficeConfig::from_env_or_yaml().context("back-office config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: BackofficeConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("bastion-backoffice");
    let state = build_state(&config).await?;
    tracing::info!(
        storage = state.store.backend_name(),
        durable = state.store.is_durable(),
        super_role = %config.super_role,
        "back-office state ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    tracing::info!(%addr, "back-office listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &BackofficeConfig) -> anyhow::Result<AppState> {
    let (store, policies) = match config.storage {
        StorageBackend::Memory => {
            let store: Arc<dyn BackofficeStore> = Arc::new(InMemoryStore::new(&config.super_role));
            let policies: Arc<dyn PolicyStore> = Arc::new(InMemoryPolicyStore::new());
            (store, policies)
        }
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            let pg_store = PostgresStore::connect(pg, &config.super_role).await?;
            let store: Arc<dyn BackofficeStore> = Arc::new(pg_store.clone());
            let policies: Arc<dyn PolicyStore> = Arc::new(pg_store);
            (store, policies)
        }
    };
    AppState::assemble(
        store,
        policies,
        &config.jwt_secret,
        &config.super_role,
        &config.cache,
    )
    .await
}
