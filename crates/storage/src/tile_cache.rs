//! In-memory bounded cache for rendered Julia tiles.
//!
//! One instance is created at server start and shared by every session as
//! `Arc<TileCache>`. Entries are keyed by [`TileKey`] and bounded by entry
//! count: after any `put` returns, `len() <= max_entries()`.
//!
//! ## Eviction
//!
//! Reads refresh recency, so the cache takes the write lock on `get`. When an
//! insert pushes the cache past `max_entries`, entries are popped from the
//! least-recently-accessed end until the bound holds again. The only excess
//! ever observable is inside the insert's own critical section.
//!
//! ## Metrics
//!
//! - `hits`/`misses`: lookup outcomes
//! - `evictions`: total entries evicted
//! - `entry_count`: current number of tiles
//! - `size_bytes`: total encoded payload bytes held

use bytes::Bytes;
use fractal_common::TileKey;
use lru::LruCache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default entry bound.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// A rendered, encoded tile.
///
/// Cloning shares the payload. A clone handed out by [`TileCache::get`] stays
/// valid after the entry is evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    /// Rendered width, smaller than the nominal tile size at canvas edges.
    pub width: u32,
    pub height: u32,
    pub lod: u32,
    /// Encoded PNG bytes.
    pub image: Bytes,
}

struct CachedTile {
    tile: Tile,
    last_accessed: Instant,
}

/// Live counters. All fields are atomic so metrics endpoints never take the
/// cache lock.
#[derive(Debug, Default)]
pub struct TileCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub entry_count: AtomicU64,
    pub size_bytes: AtomicU64,
}

impl TileCacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.entry_count.store(0, Ordering::Relaxed);
        self.size_bytes.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`TileCacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: u64,
    pub size_bytes: u64,
    pub max_entries: usize,
    pub hit_rate: f64,
}

pub struct TileCache {
    cache: RwLock<LruCache<TileKey, CachedTile>>,
    max_entries: usize,
    stats: TileCacheStats,
}

impl TileCache {
    /// Create a cache holding at most `max_entries` tiles.
    ///
    /// A bound of zero is raised to one.
    ///
    /// # Example
    /// ```
    /// use storage::TileCache;
    ///
    /// let cache = TileCache::new(1000);
    /// assert_eq!(cache.max_entries(), 1000);
    /// ```
    pub fn new(max_entries: usize) -> Self {
        // The lru crate's own capacity would evict before our overshoot check
        // runs, so the map is unbounded and the bound is enforced here.
        Self {
            cache: RwLock::new(LruCache::unbounded()),
            max_entries: max_entries.max(1),
            stats: TileCacheStats::default(),
        }
    }

    /// Look up a tile, refreshing its access time. A miss is not an error.
    pub async fn get(&self, key: &TileKey) -> Option<Tile> {
        let mut cache = self.cache.write().await;

        match cache.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.tile.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite a tile, then enforce the entry bound.
    pub async fn put(&self, key: TileKey, tile: Tile) {
        let tile_size = tile.image.len() as u64;
        let mut cache = self.cache.write().await;

        let entry = CachedTile {
            tile,
            last_accessed: Instant::now(),
        };

        match cache.put(key, entry) {
            Some(previous) => {
                self.stats
                    .size_bytes
                    .fetch_sub(previous.tile.image.len() as u64, Ordering::Relaxed);
            }
            None => {
                self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.size_bytes.fetch_add(tile_size, Ordering::Relaxed);

        self.evict_locked(&mut cache);
    }

    /// Remove oldest-accessed entries until the bound holds.
    ///
    /// Returns the number of entries evicted.
    pub async fn evict_if_over_capacity(&self) -> usize {
        let mut cache = self.cache.write().await;
        self.evict_locked(&mut cache)
    }

    fn evict_locked(&self, cache: &mut LruCache<TileKey, CachedTile>) -> usize {
        if cache.len() <= self.max_entries {
            return 0;
        }

        let mut entries_evicted = 0usize;
        let mut bytes_freed = 0u64;

        while cache.len() > self.max_entries {
            let Some((key, evicted)) = cache.pop_lru() else {
                break;
            };
            debug!(
                key = %key,
                idle_ms = evicted.last_accessed.elapsed().as_millis() as u64,
                "Evicted tile"
            );
            bytes_freed += evicted.tile.image.len() as u64;
            entries_evicted += 1;
        }

        self.stats.size_bytes.fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(entries_evicted as u64, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(entries_evicted as u64, Ordering::Relaxed);

        debug!(
            entries_evicted = entries_evicted,
            bytes_freed = bytes_freed,
            entry_count = cache.len(),
            max_entries = self.max_entries,
            "Tile cache eviction completed"
        );

        entries_evicted
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Live counters, readable without the cache lock.
    pub fn counters(&self) -> &TileCacheStats {
        &self.stats
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            entry_count: self.stats.entry_count.load(Ordering::Relaxed),
            size_bytes: self.stats.size_bytes.load(Ordering::Relaxed),
            max_entries: self.max_entries,
            hit_rate: self.stats.hit_rate(),
        }
    }

    /// Drop every entry and reset statistics. Returns the number dropped.
    pub async fn clear(&self) -> usize {
        let mut cache = self.cache.write().await;
        let dropped = cache.len();
        cache.clear();
        self.stats.reset();
        info!(entries_dropped = dropped, "Tile cache cleared");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_common::{Complex, Offset, RenderConfig};

    fn config() -> RenderConfig {
        RenderConfig {
            c: Complex::new(-0.8, 0.156),
            center: Complex::ZERO,
            zoom: 100.0,
            coloring: 1,
            max_iterations: 100,
            width: 4096,
            height: 4096,
            lod: 1,
        }
    }

    fn key(i: u32) -> TileKey {
        TileKey::new(&config(), (i % 32) * 128, (i / 32) * 128, 1, Offset::default(), 128)
    }

    fn tile(i: u32, payload: &'static [u8]) -> Tile {
        Tile {
            x: (i % 32) * 128,
            y: (i / 32) * 128,
            width: 128,
            height: 128,
            lod: 1,
            image: Bytes::from_static(payload),
        }
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = TileCache::new(10);

        assert!(cache.is_empty().await);
        assert!(cache.get(&key(0)).await.is_none());

        cache.put(key(0), tile(0, b"png")).await;
        assert_eq!(cache.len().await, 1);

        let hit = cache.get(&key(0)).await.unwrap();
        assert_eq!(hit.image, Bytes::from_static(b"png"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 3);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_count_and_updates_size() {
        let cache = TileCache::new(10);
        cache.put(key(0), tile(0, b"aa")).await;
        cache.put(key(0), tile(0, b"bbbbb")).await;

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 5);
        assert_eq!(cache.get(&key(0)).await.unwrap().image, Bytes::from_static(b"bbbbb"));
    }

    #[tokio::test]
    async fn test_bound_holds_after_every_put() {
        let cache = TileCache::new(5);
        for i in 0..12 {
            cache.put(key(i), tile(i, b"x")).await;
            assert!(cache.len().await <= 5);
        }
        assert_eq!(cache.stats().evictions, 7);
        assert_eq!(cache.stats().entry_count, 5);
    }

    #[tokio::test]
    async fn test_oldest_access_is_evicted_first() {
        let cache = TileCache::new(3);
        cache.put(key(0), tile(0, b"0")).await;
        cache.put(key(1), tile(1, b"1")).await;
        cache.put(key(2), tile(2, b"2")).await;

        // touching 0 makes 1 the oldest access
        assert!(cache.get(&key(0)).await.is_some());
        cache.put(key(3), tile(3, b"3")).await;

        assert!(cache.get(&key(1)).await.is_none());
        assert!(cache.get(&key(0)).await.is_some());
        assert!(cache.get(&key(2)).await.is_some());
        assert!(cache.get(&key(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_evicted_copy_stays_valid() {
        let cache = TileCache::new(1);
        cache.put(key(0), tile(0, b"first")).await;
        let held = cache.get(&key(0)).await.unwrap();

        cache.put(key(1), tile(1, b"second")).await;
        assert!(cache.get(&key(0)).await.is_none());
        assert_eq!(held.image, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_evict_if_over_capacity_is_noop_within_bound() {
        let cache = TileCache::new(4);
        cache.put(key(0), tile(0, b"0")).await;
        assert_eq!(cache.evict_if_over_capacity().await, 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_resets_stats() {
        let cache = TileCache::new(4);
        cache.put(key(0), tile(0, b"0")).await;
        cache.put(key(1), tile(1, b"1")).await;
        let _ = cache.get(&key(0)).await;

        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty().await);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.entry_count, stats.size_bytes), (0, 0, 0));
    }

    #[test]
    fn test_zero_bound_is_raised() {
        assert_eq!(TileCache::new(0).max_entries(), 1);
    }
}
