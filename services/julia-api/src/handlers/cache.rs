//! Tile cache management handlers.

use axum::{extract::Extension, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::state::AppState;

/// GET /api/cache/stats - Cache, scheduler and session statistics
#[instrument(skip(state))]
pub async fn cache_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let cache = state.cache.stats();
    let scheduler = state.scheduler.stats().snapshot();
    let batches = state.metrics.batch_timing().await;

    Json(serde_json::json!({
        "cache": cache,
        "scheduler": scheduler,
        "batches": batches,
        "uptime_secs": state.metrics.uptime_secs(),
    }))
}

/// POST /api/cache/clear - Drop every cached tile
#[instrument(skip(state))]
pub async fn cache_clear_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let cleared = state.cache.clear().await;
    info!(cleared = cleared, "Tile cache cleared via API");

    Json(serde_json::json!({ "cleared": cleared }))
}
