//! HTTP request handlers.
//!
//! This module is organized into submodules:
//! - `ws`: WebSocket upgrade and the socket-backed session transport
//! - `julia`: whole-canvas PNG composed from tiles
//! - `metrics`: health check and Prometheus metrics
//! - `cache`: tile cache statistics and management

pub mod cache;
pub mod julia;
pub mod metrics;
pub mod ws;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fractal_common::FractalError;

pub use cache::{cache_clear_handler, cache_stats_handler};
pub use julia::julia_handler;
pub use metrics::{health_handler, metrics_handler};
pub use ws::{ws_handler, WebSocketTransport};

/// Error response with a JSON body: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub FractalError);

impl From<FractalError> for ApiError {
    fn from(err: FractalError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
