//! Shellward authority service entry point.
//!
//! # Purpose
//! Loads configuration and signing keys, builds the services over the
//! in-memory store, and serves the system router and Prometheus metrics
//! until interrupted.
use anyhow::Context;
use authority::app::{AuthorityServices, build_router};
use authority::config::AuthorityConfig;
use authority::observability;
use authority::store::CredentialStore;
use authority::store::memory::InMemoryStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let metrics_handle = observability::init_observability("shellward-authority");
    let config = AuthorityConfig::from_env_or_yaml().context("authority config")?;
    run_with_shutdown(config, metrics_handle, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(
    config: AuthorityConfig,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryStore::new());
    let services = AuthorityServices::build(&config, store).context("build authority services")?;
    services
        .store
        .health_check()
        .await
        .context("store health check")?;

    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "authority listening");
    axum::serve(listener, build_router(services).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    metrics_task.abort();
    let _ = metrics_task.await;
    tracing::info!("authority stopped");
    Ok(())
}
