//! HTTP surfaces of the prediction server and the router

pub mod predict;
pub mod proxy;

use axum::http::StatusCode;

/// Liveness probe: succeeds whenever the process is up
pub async fn health() -> StatusCode {
    StatusCode::OK
}
