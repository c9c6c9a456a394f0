//! Julia tile API service library.
//!
//! Exposes the router and internal modules for the binary and for tests.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod scheduler;
pub mod session;
pub mod state;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Tile sessions
        .route("/ws", get(handlers::ws_handler))
        // Whole canvas
        .route("/julia", post(handlers::julia_handler))
        // Health check and metrics
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // Cache API
        .route("/api/cache/stats", get(handlers::cache_stats_handler))
        .route("/api/cache/clear", post(handlers::cache_clear_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
