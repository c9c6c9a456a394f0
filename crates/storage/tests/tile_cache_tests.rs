//! Concurrency and capacity tests for the shared tile cache.

use bytes::Bytes;
use fractal_common::{Complex, Offset, RenderConfig, TileKey};
use std::sync::Arc;
use storage::{Tile, TileCache};

fn config(zoom: f64) -> RenderConfig {
    RenderConfig {
        c: Complex::new(-0.7, 0.27015),
        center: Complex::ZERO,
        zoom,
        coloring: 1,
        max_iterations: 100,
        width: 256,
        height: 256,
        lod: 1,
    }
}

/// Distinct key per `i`, varying zoom so the canvas never runs out of tiles.
fn key(i: u32) -> TileKey {
    TileKey::new(&config(100.0 + i as f64), 0, 0, 1, Offset::default(), 128)
}

fn tile(i: u32) -> Tile {
    Tile {
        x: 0,
        y: 0,
        width: 128,
        height: 128,
        lod: 1,
        image: Bytes::from(i.to_be_bytes().to_vec()),
    }
}

// ============================================================================
// Capacity tests
// ============================================================================

#[tokio::test]
async fn test_max_plus_k_inserts_keep_bound_and_recent_entries() {
    const MAX: usize = 1000;
    const K: u32 = 37;

    let cache = TileCache::new(MAX);
    for i in 0..(MAX as u32 + K) {
        cache.put(key(i), tile(i)).await;
    }

    assert_eq!(cache.len().await, MAX);
    assert_eq!(cache.stats().evictions, K as u64);

    // the most recent MAX inserts survive, the first K do not
    for i in 0..K {
        assert!(cache.get(&key(i)).await.is_none(), "key {} should be evicted", i);
    }
    for i in K..(MAX as u32 + K) {
        let hit = cache.get(&key(i)).await;
        assert_eq!(hit.map(|t| t.image), Some(tile(i).image));
    }
}

// ============================================================================
// Concurrency tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_respect_bound() {
    let cache = Arc::new(TileCache::new(64));

    let writers: Vec<_> = (0..8u32)
        .map(|w| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..100u32 {
                    let id = w * 1000 + i;
                    cache.put(key(id), tile(id)).await;
                    let _ = cache.get(&key(id)).await;
                }
            })
        })
        .collect();

    for result in futures::future::join_all(writers).await {
        result.unwrap();
    }

    assert_eq!(cache.len().await, 64);
    let stats = cache.stats();
    assert_eq!(stats.entry_count, 64);
    assert_eq!(stats.evictions, 800 - 64);
    assert_eq!(stats.size_bytes, 64 * 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_payload() {
    let cache = Arc::new(TileCache::new(8));
    cache.put(key(1), tile(1)).await;

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&key(1)).await })
        })
        .collect();

    for result in futures::future::join_all(readers).await {
        let hit = result.unwrap().unwrap();
        assert_eq!(hit.image, tile(1).image);
    }
    assert_eq!(cache.stats().hits, 16);
}

// ============================================================================
// Logging tests
// ============================================================================

/// Collects formatted log output for inspection.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_steady_state_eviction_is_quiet_at_info() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let cache = TileCache::new(2);
    for i in 0..10 {
        cache.put(key(i), tile(i)).await;
    }

    assert_eq!(cache.stats().evictions, 8);
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(!output.contains("evict"), "unexpected info output: {output}");
}
