//! Tile addressing and canvas-edge clipping.
//!
//! Tiles are addressed by the pixel coordinates of their top-left corner,
//! not by column/row index. A canvas `width x height` is covered by tiles at
//! origins `(i * tile_size, j * tile_size)`; tiles on the right and bottom
//! edges are clipped to the canvas.

use serde::{Deserialize, Serialize};

use crate::config::clamp_lod;
use crate::{FractalError, FractalResult, RenderConfig};

/// Nominal tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 128;

/// One requested tile within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRequest {
    /// Tile origin, absolute canvas pixel column.
    pub x: u32,
    /// Tile origin, absolute canvas pixel row.
    pub y: u32,
    pub lod: u32,
}

impl TileRequest {
    pub fn new(x: u32, y: u32, lod: u32) -> Self {
        Self {
            x,
            y,
            lod: clamp_lod(lod as i64),
        }
    }

    /// Parse `"x,y"` or `"x,y,lod"`.
    ///
    /// `default_lod` applies to the two-component form. An explicit lod is
    /// clamped into the supported range like the batch lod.
    pub fn parse(s: &str, default_lod: u32) -> FractalResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(FractalError::MalformedTile(format!(
                "expected \"x,y\" or \"x,y,lod\", got {:?}",
                s
            )));
        }

        let parse_coord = |value: &str| {
            value.parse::<u32>().map_err(|e| {
                FractalError::MalformedTile(format!("{:?} in {:?}: {}", value, s, e))
            })
        };
        let x = parse_coord(parts[0])?;
        let y = parse_coord(parts[1])?;

        let lod = match parts.get(2) {
            Some(raw) => {
                let lod = raw.parse::<i64>().map_err(|e| {
                    FractalError::MalformedTile(format!("lod {:?} in {:?}: {}", raw, s, e))
                })?;
                clamp_lod(lod)
            }
            None => clamp_lod(default_lod as i64),
        };

        Ok(Self { x, y, lod })
    }

    /// Squared distance from the tile origin to the canvas center.
    pub fn distance_sq_to_center(&self, config: &RenderConfig) -> f64 {
        let (cx, cy) = config.pixel_center();
        let dx = self.x as f64 - cx;
        let dy = self.y as f64 - cy;
        dx * dx + dy * dy
    }
}

/// Parse a client's tile list, failing on the first malformed entry.
pub fn parse_tile_list<S: AsRef<str>>(
    tiles: &[S],
    default_lod: u32,
) -> FractalResult<Vec<TileRequest>> {
    tiles
        .iter()
        .map(|s| TileRequest::parse(s.as_ref(), default_lod))
        .collect()
}

/// Every tile origin needed to cover the canvas, row-major.
pub fn viewport_tiles(config: &RenderConfig, tile_size: u32) -> Vec<TileRequest> {
    let tile_size = tile_size.max(1);
    let tiles_x = config.width.div_ceil(tile_size);
    let tiles_y = config.height.div_ceil(tile_size);

    let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            tiles.push(TileRequest::new(tx * tile_size, ty * tile_size, config.lod));
        }
    }
    tiles
}

/// The pixel rectangle a tile actually covers after edge clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileExtent {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileExtent {
    /// Clip a nominal `tile_size` square at `(x, y)` to the canvas.
    ///
    /// Returns `None` when the origin lies outside the canvas.
    pub fn clip(config: &RenderConfig, x: u32, y: u32, tile_size: u32) -> Option<Self> {
        if x >= config.width || y >= config.height || tile_size == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width: tile_size.min(config.width - x),
            height: tile_size.min(config.height - y),
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
