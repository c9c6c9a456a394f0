//! Common types shared across the julia-tiles crates.
//!
//! Everything here is plain data: the render configuration a client sends,
//! tile geometry, and the canonical cache key derived from both.

pub mod complex;
pub mod config;
pub mod error;
pub mod key;
pub mod tile;

pub use complex::Complex;
pub use config::{Offset, RenderConfig, MAX_LOD, MIN_LOD};
pub use error::{FractalError, FractalResult};
pub use key::TileKey;
pub use tile::{parse_tile_list, viewport_tiles, TileExtent, TileRequest, DEFAULT_TILE_SIZE};
