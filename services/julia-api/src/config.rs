//! Server configuration.
//!
//! Values are layered: built-in defaults, then environment variables (a
//! `.env` file is loaded by `main` first), then CLI flags applied by `main`.

use fractal_common::DEFAULT_TILE_SIZE;
use serde::{Deserialize, Serialize};
use storage::DEFAULT_MAX_ENTRIES;

/// Largest accepted nominal tile edge.
pub const MAX_TILE_SIZE: u32 = 1024;

/// Configuration for the julia-api server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    pub listen: String,

    /// Nominal tile edge length in pixels.
    pub tile_size: u32,

    /// Maximum number of cached tiles.
    pub max_cache_size: usize,

    /// Maximum tile renders in flight across all sessions.
    pub render_concurrency: usize,

    /// Capacity of each batch's result channel.
    pub tile_channel_capacity: usize,

    /// Tokio worker threads (None = one per core).
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            max_cache_size: DEFAULT_MAX_ENTRIES,
            render_concurrency: default_concurrency(),
            tile_channel_capacity: 64,
            worker_threads: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("LISTEN_ADDR") {
            config.listen = val;
        }

        if let Some(val) = lookup("TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Some(val) = lookup("MAX_CACHE_SIZE") {
            if let Ok(size) = val.parse() {
                config.max_cache_size = size;
            }
        }

        if let Some(val) = lookup("RENDER_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.render_concurrency = n;
            }
        }

        if let Some(val) = lookup("TILE_CHANNEL_CAPACITY") {
            if let Ok(n) = val.parse() {
                config.tile_channel_capacity = n;
            }
        }

        if let Some(val) = lookup("TOKIO_WORKER_THREADS") {
            if let Ok(n) = val.parse() {
                config.worker_threads = Some(n);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be 1-{}", MAX_TILE_SIZE));
        }

        if self.max_cache_size == 0 {
            return Err("max_cache_size must be > 0".to_string());
        }

        if self.render_concurrency == 0 {
            return Err("render_concurrency must be > 0".to_string());
        }

        if self.tile_channel_capacity == 0 {
            return Err("tile_channel_capacity must be > 0".to_string());
        }

        if self.worker_threads == Some(0) {
            return Err("worker_threads must be > 0".to_string());
        }

        Ok(())
    }
}
