//! Try-On Orchestrator Server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tryon_provider::HttpProvider;
use tryon_server::{
    http, AssetStore, Config, InMemoryUsage, Orchestrator, Scheduler, TaskStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .init();

    let config = Config::from_env();
    let addr: SocketAddr = config.bind_addr.parse()?;

    if config.provider_api_key.is_empty() {
        warn!("TRYON_PROVIDER_API_KEY is not set - provider submissions will be rejected");
    }

    let provider = Arc::new(HttpProvider::new(
        &config.provider_base_url,
        config.provider_api_key.clone(),
    )?);
    let store = Arc::new(TaskStore::new());
    let assets = Arc::new(AssetStore::new(config.upload_root.clone())?);
    let usage = Arc::new(InMemoryUsage::new());

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        assets,
        provider,
        usage,
        config.stale_poll_limit,
    ));

    let scheduler = Scheduler::new(
        orchestrator.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );
    scheduler.start();

    let router = http::create_router(orchestrator)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        provider = %config.provider_base_url,
        poll_interval_secs = config.poll_interval_secs,
        "Starting try-on orchestrator"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    scheduler.stop().await;
    Ok(())
}
