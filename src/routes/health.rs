//! Health, readiness and metrics endpoints.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use tracing::trace;

use crate::metrics::encode_metrics;

/// GET /health
pub async fn health() -> impl IntoResponse {
    trace!("health request received");
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], "{}")
}

/// GET /ready
pub async fn ready() -> impl IntoResponse {
    trace!("readiness request received");
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], "{}")
}

/// GET /metrics — Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
