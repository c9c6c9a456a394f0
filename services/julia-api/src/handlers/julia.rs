//! Whole-canvas rendering over the tile engine.
//!
//! The canvas is requested as an ordinary batch covering every tile, so
//! tiles already cached by streaming sessions are reused. The encoded tiles
//! are decoded, composited into one RGBA canvas and re-encoded.

use axum::{
    body::Bytes,
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use fractal_common::{viewport_tiles, FractalError, FractalResult, Offset, RenderConfig};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use storage::Tile;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::ApiError;
use crate::state::AppState;

/// Body of `POST /julia`: a render configuration, optionally with an offset.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasRequest {
    #[serde(flatten)]
    pub config: RenderConfig,
    #[serde(default)]
    pub offset: Offset,
}

/// POST /julia - Render the whole canvas as one PNG.
#[instrument(skip(state, body))]
pub async fn julia_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: CanvasRequest = serde_json::from_slice(&body).map_err(FractalError::from)?;
    request.config.validate()?;
    request.offset.validate()?;
    state.metrics.record_canvas_request();

    let started = Instant::now();
    let config = request.config;
    let requests = viewport_tiles(&config, state.scheduler.tile_size());
    let expected = requests.len();

    let tiles: Vec<Tile> = state
        .scheduler
        .schedule(config, requests, request.offset, CancellationToken::new())
        .collect()
        .await;

    if tiles.len() != expected {
        return Err(FractalError::Internal(format!(
            "{} of {} tiles failed to render",
            expected - tiles.len(),
            expected
        ))
        .into());
    }

    let png = tokio::task::spawn_blocking(move || compose_canvas(&config, &tiles))
        .await
        .map_err(|e| FractalError::Internal(e.to_string()))??;

    info!(
        width = config.width,
        height = config.height,
        tiles = expected,
        bytes = png.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Canvas rendered"
    );

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Decode every tile, paste it at its origin and encode the canvas.
pub fn compose_canvas(config: &RenderConfig, tiles: &[Tile]) -> FractalResult<Vec<u8>> {
    let mut canvas = image::RgbaImage::new(config.width, config.height);

    for tile in tiles {
        let decoded = image::load_from_memory_with_format(&tile.image, image::ImageFormat::Png)
            .map_err(|e| {
                FractalError::EncodeError(format!("tile ({}, {}): {}", tile.x, tile.y, e))
            })?
            .to_rgba8();
        image::imageops::replace(&mut canvas, &decoded, tile.x as i64, tile.y as i64);
    }

    renderer::png::create_png_auto(canvas.as_raw(), config.width as usize, config.height as usize)
        .map_err(|e| FractalError::EncodeError(e.to_string()))
}
