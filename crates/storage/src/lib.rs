//! Tile storage for the julia-tiles services.
//!
//! Provides the shared in-memory [`TileCache`] that maps canonical tile keys
//! to encoded tile images.

pub mod tile_cache;

pub use tile_cache::{CacheStatsSnapshot, Tile, TileCache, TileCacheStats, DEFAULT_MAX_ENTRIES};
