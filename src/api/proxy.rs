//! Router routes: status page and prediction relay

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::health;
use crate::backend::InvocationResponse;
use crate::error::{AppError, Result};
use crate::logging::request_logger;
use crate::middleware::RateLimitLayer;
use crate::RouterAppState;

/// Build the router's HTTP surface
pub fn create_router(state: Arc<RouterAppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/predict", post(proxy))
        .route("/invocations", post(proxy));

    if state.settings.rate_limit.enabled {
        router = router.layer(RateLimitLayer::from_config(&state.settings.rate_limit));
    }
    if state.settings.router.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - names the backend requests would go to right now
async fn status(State(state): State<Arc<RouterAppState>>) -> String {
    match state.gateway.resolver().resolve_active_backend().await {
        Some(backend) => format!("Router is live! Currently routing to: {}", backend),
        None => "Router is live, but no InService deployments were found.".to_string(),
    }
}

/// POST /predict - relay to the active deployment
async fn proxy(
    State(state): State<Arc<RouterAppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let outcome = state.gateway.forward(body, content_type).await?;
    Ok(relay_response(outcome.response))
}

fn relay_response(reply: InvocationResponse) -> Response {
    let status = match StatusCode::from_u16(reply.status) {
        Ok(status) => status,
        Err(_) => {
            return AppError::BackendUnavailable(format!(
                "backend answered with invalid status {}",
                reply.status
            ))
            .into_response()
        }
    };

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = reply.content_type.as_deref() {
        builder = builder.header(CONTENT_TYPE, content_type);
    }

    builder
        .body(Body::from(reply.body))
        .unwrap_or_else(|e| AppError::Internal(format!("Failed to relay response: {}", e)).into_response())
}
