//! Tile rasterization for Julia-set imagery.
//!
//! - [`escape`]: the escape-time evaluator for a single point
//! - [`coloring`]: the closed registry of coloring functions
//! - [`raster`]: per-tile rasterization with LOD sampling and cancellation
//! - [`png`]: PNG encoding of RGBA pixel buffers

pub mod coloring;
pub mod escape;
pub mod png;
pub mod raster;

pub use coloring::{Coloring, Rgba};
pub use escape::{evaluate, Escape};
pub use raster::{render_tile, CancelToken, Cancelled, NeverCancel, RgbaImage};
