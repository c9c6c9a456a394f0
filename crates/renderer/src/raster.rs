//! Per-tile rasterization.
//!
//! A tile is rendered into an RGBA buffer covering its clipped extent. The
//! level of detail picks the sampling block size: one escape-time evaluation
//! at a block's top-left pixel colors the whole block.

use fractal_common::config::lod_block_size;
use fractal_common::{Offset, RenderConfig, TileExtent};

use crate::coloring::Coloring;
use crate::escape::evaluate;

/// Returned when a render observes its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Cooperative cancellation, polled once per block row.
pub trait CancelToken: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F> CancelToken for F
where
    F: Fn() -> bool + Send + Sync,
{
    #[inline]
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Row-major RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl RgbaImage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// RGBA of one pixel, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Paint the block `[x, x+w) x [y, y+h)`, clipped to the image.
    fn fill_block(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x_end = (x + w).min(self.width) as usize;
        let y_end = (y + h).min(self.height) as usize;
        let stride = self.width as usize * 4;

        for row in y as usize..y_end {
            let start = row * stride + x as usize * 4;
            let end = row * stride + x_end * 4;
            for px in self.pixels[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }
}

/// Render one clipped tile.
///
/// `extent` is in absolute canvas pixels. Coloring functions receive
/// tile-local pixel coordinates. The returned image always has the full
/// extent dimensions regardless of `lod`.
pub fn render_tile<C: CancelToken + ?Sized>(
    config: &RenderConfig,
    extent: TileExtent,
    lod: u32,
    offset: Offset,
    cancel: &C,
) -> Result<RgbaImage, Cancelled> {
    let block = lod_block_size(lod);
    let coloring = Coloring::lookup(config.coloring);
    let max_iterations = config.max_iterations;
    let mut image = RgbaImage::new(extent.width, extent.height);

    for by in (0..extent.height).step_by(block as usize) {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let abs_y = (extent.y + by) as f64;
        for bx in (0..extent.width).step_by(block as usize) {
            let abs_x = (extent.x + bx) as f64;
            let point = config.pixel_to_complex(abs_x, abs_y, offset);
            let escape = evaluate(point, config.c, max_iterations);
            let rgba = coloring.color(escape.iterations, max_iterations, escape.final_z, bx, by);
            image.fill_block(bx, by, block, block, rgba.to_array());
        }
    }

    Ok(image)
}
