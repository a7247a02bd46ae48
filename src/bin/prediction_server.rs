//! Prediction server entry point

use sentiment_gateway::{api, config::Settings, logging, PredictionAppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    logging::init(&settings.logging);

    info!("Starting prediction server");
    info!(
        "Loaded configuration: server={}:{}, artifact_dirs={:?}, max_len={}",
        settings.server.host,
        settings.server.port,
        settings.predictor.artifact_dirs,
        settings.predictor.max_len
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = Arc::new(PredictionAppState::load(settings));

    match state.predictor.load_error() {
        None => info!("Artifacts ready, serving predictions"),
        Some(reason) => warn!(reason = %reason, "Serving health checks only until artifacts are fixed"),
    }

    let app = api::predict::create_router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
