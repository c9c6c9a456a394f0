//! Canonical cache keys for rendered tiles.
//!
//! ## Precision policy
//!
//! Floating-point inputs are keyed by their exact IEEE-754 bit pattern after
//! folding `-0.0` into `+0.0`. Two inputs share a key only when every float
//! compares equal, so configurations that differ beyond any fixed decimal
//! precision never collide, and no rounding step can merge distinct views.
//! Non-finite values are rejected by [`RenderConfig::validate`] before a key
//! is ever built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Offset, RenderConfig, TileExtent};

/// Canonical bit pattern of a float for keying.
#[inline]
fn key_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Identity of a renderable tile. Equal keys render byte-identical images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    c_real: u64,
    c_imag: u64,
    center_real: u64,
    center_imag: u64,
    zoom: u64,
    max_iterations: u32,
    width: u32,
    height: u32,
    coloring: i32,
    tile_x: u32,
    tile_y: u32,
    tile_width: u32,
    tile_height: u32,
    lod: u32,
    offset_x: u64,
    offset_y: u64,
}

impl TileKey {
    /// Build the key for one tile. Total: every input yields a key.
    ///
    /// `tile_size` only matters through the clipped extent; a tile origin
    /// outside the canvas keys with a zero extent.
    pub fn new(
        config: &RenderConfig,
        tile_x: u32,
        tile_y: u32,
        lod: u32,
        offset: Offset,
        tile_size: u32,
    ) -> Self {
        let (tile_width, tile_height) = TileExtent::clip(config, tile_x, tile_y, tile_size)
            .map(|e| (e.width, e.height))
            .unwrap_or((0, 0));

        Self {
            c_real: key_bits(config.c.real),
            c_imag: key_bits(config.c.imag),
            center_real: key_bits(config.center.real),
            center_imag: key_bits(config.center.imag),
            zoom: key_bits(config.zoom),
            max_iterations: config.max_iterations,
            width: config.width,
            height: config.height,
            coloring: config.coloring,
            tile_x,
            tile_y,
            tile_width,
            tile_height,
            lod,
            offset_x: key_bits(offset.x),
            offset_y: key_bits(offset.y),
        }
    }

    pub fn tile_origin(&self) -> (u32, u32) {
        (self.tile_x, self.tile_y)
    }

    pub fn lod(&self) -> u32 {
        self.lod
    }
}

impl fmt::Display for TileKey {
    /// Lossless text form, used for logging. Floats print as hex bit patterns.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "julia:c={:016x},{:016x}:center={:016x},{:016x}:zoom={:016x}:it={}:canvas={}x{}:col={}:tile={},{}:{}x{}:lod={}:off={:016x},{:016x}",
            self.c_real,
            self.c_imag,
            self.center_real,
            self.center_imag,
            self.zoom,
            self.max_iterations,
            self.width,
            self.height,
            self.coloring,
            self.tile_x,
            self.tile_y,
            self.tile_width,
            self.tile_height,
            self.lod,
            self.offset_x,
            self.offset_y
        )
    }
}
