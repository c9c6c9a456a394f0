//! Render configuration frames.
//!
//! A [`RenderConfig`] describes one fractal view exactly as the client sent
//! it. One instance scopes one viewport-update batch and is never mutated
//! after validation.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Complex, FractalError, FractalResult};

/// Coarsest level of detail.
pub const MIN_LOD: u32 = 1;

/// Finest level of detail (one sample per pixel).
pub const MAX_LOD: u32 = 4;

/// Largest accepted canvas edge in pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 16_384;

/// Largest accepted iteration budget per pixel.
pub const MAX_ITERATIONS_LIMIT: u32 = 100_000;

/// One fractal view: Julia constant, viewport and rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Julia constant `c` in `z = z^2 + c`.
    pub c: Complex,
    /// Fractal-plane point shown at the canvas center.
    pub center: Complex,
    /// Pixels per fractal-plane unit.
    pub zoom: f64,
    /// Coloring registry id. Unknown ids fall back to the default coloring.
    #[serde(alias = "coloringId")]
    pub coloring: i32,
    pub max_iterations: u32,
    pub width: u32,
    pub height: u32,
    /// Default level of detail for tiles requested without an explicit one.
    #[serde(default = "default_lod", deserialize_with = "deserialize_lod")]
    pub lod: u32,
}

fn default_lod() -> u32 {
    MIN_LOD
}

fn deserialize_lod<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_lod(raw))
}

/// Clamp any integer into the supported LOD range.
pub fn clamp_lod(lod: i64) -> u32 {
    lod.clamp(MIN_LOD as i64, MAX_LOD as i64) as u32
}

/// Edge length in pixels of the block that shares one sample at `lod`.
///
/// `MIN_LOD` samples every 8th pixel, `MAX_LOD` samples every pixel.
pub fn lod_block_size(lod: u32) -> u32 {
    let lod = lod.clamp(MIN_LOD, MAX_LOD);
    1 << (MAX_LOD - lod)
}

impl RenderConfig {
    /// Check every field against the accepted ranges.
    pub fn validate(&self) -> FractalResult<()> {
        if !self.c.is_finite() {
            return Err(FractalError::invalid("c", "must be finite"));
        }
        if !self.center.is_finite() {
            return Err(FractalError::invalid("center", "must be finite"));
        }
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(FractalError::invalid(
                "zoom",
                format!("must be a finite value > 0, got {}", self.zoom),
            ));
        }
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(FractalError::invalid(
                "maxIterations",
                format!("must be in 1..={}", MAX_ITERATIONS_LIMIT),
            ));
        }
        if self.width == 0 || self.width > MAX_CANVAS_DIMENSION {
            return Err(FractalError::invalid(
                "width",
                format!("must be in 1..={}", MAX_CANVAS_DIMENSION),
            ));
        }
        if self.height == 0 || self.height > MAX_CANVAS_DIMENSION {
            return Err(FractalError::invalid(
                "height",
                format!("must be in 1..={}", MAX_CANVAS_DIMENSION),
            ));
        }
        Ok(())
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> FractalResult<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Canvas center in pixel space.
    pub fn pixel_center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Map an absolute canvas pixel to the fractal plane.
    pub fn pixel_to_complex(&self, abs_x: f64, abs_y: f64, offset: Offset) -> Complex {
        let zoom = self.zoom;
        Complex {
            real: (abs_x - offset.x) / zoom - self.width as f64 / (2.0 * zoom) + self.center.real,
            imag: (abs_y - offset.y) / zoom - self.height as f64 / (2.0 * zoom) + self.center.imag,
        }
    }
}

/// Sub-pixel panning translation applied before mapping to the fractal plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Offset {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn validate(&self) -> FractalResult<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(FractalError::invalid("offset", "must be finite"));
        }
        Ok(())
    }
}
