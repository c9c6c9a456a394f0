//! Health checks and metrics endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use crate::state::AppState;

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
///
/// Cache and scheduler snapshots are rendered directly; everything recorded
/// through the `metrics` facade comes from the Prometheus recorder, when one
/// is installed.
#[instrument(skip(state))]
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let cache_stats = state.cache.stats();
    let scheduler_stats = state.scheduler.stats().snapshot();

    let mut output = state
        .metrics
        .render_prometheus(&cache_stats, &scheduler_stats);

    if let Some(handle) = &state.prometheus {
        output.push_str(&handle.render());
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        output,
    )
        .into_response()
}
