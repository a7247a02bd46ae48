//! Prediction server routes

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::health;
use crate::error::{AppError, Result};
use crate::logging::request_logger;
use crate::predictor::request::{PredictResponse, TextInput};
use crate::PredictionAppState;

/// Build the prediction server router.
///
/// `/ping` and `/invocations` mirror `/health` and `/predict` for hosting
/// platforms that probe those paths.
pub fn create_router(state: Arc<PredictionAppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ping", get(health))
        .route("/predict", post(predict))
        .route("/invocations", post(predict))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /predict
async fn predict(
    State(state): State<Arc<PredictionAppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictResponse>> {
    require_json(&headers)?;
    let texts = TextInput::parse(&body)?.into_texts();

    let predictions = state.predictor.predict(texts).await?;
    Ok(Json(PredictResponse { predictions }))
}

fn require_json(headers: &HeaderMap) -> Result<()> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false);

    if is_json {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(
            "This predictor only supports application/json data".to_string(),
        ))
    }
}
