//! Router entry point: relays predictions to the active deployment

use sentiment_gateway::{api, config::Settings, logging, RouterAppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    logging::init(&settings.logging);

    info!("Starting sentiment router");
    info!(
        "Loaded configuration: router={}:{}, hosting={}, prefix={}",
        settings.router.host,
        settings.router.port,
        settings.discovery.hosting_url,
        settings.discovery.name_prefix
    );

    let addr = format!("{}:{}", settings.router.host, settings.router.port);
    let state = Arc::new(RouterAppState::from_settings(settings)?);

    info!("Checking for available deployments...");
    match state.gateway.resolver().resolve_active_backend().await {
        Some(backend) => info!(backend = %backend, "Ready! Initial target resolved"),
        None => warn!("No active deployments found yet. Waiting for deployment..."),
    }

    let app = api::proxy::create_router(state);

    info!("Router listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
