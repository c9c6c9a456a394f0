//! Application metrics collection and reporting.
//!
//! Counters are kept twice: as atomics for the JSON stats endpoint and the
//! hand-written part of `/metrics`, and through the `metrics` facade for the
//! Prometheus recorder installed by `main`.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::scheduler::SchedulerStatsSnapshot;
use storage::CacheStatsSnapshot;

/// Metrics collector for the julia API.
#[derive(Debug)]
pub struct MetricsCollector {
    pub sessions_opened: AtomicU64,
    pub sessions_active: AtomicU64,
    pub batches: AtomicU64,
    pub tiles_sent: AtomicU64,
    pub tile_bytes_sent: AtomicU64,
    pub decode_failures: AtomicU64,
    pub write_failures: AtomicU64,
    pub canvas_requests: AtomicU64,

    batch_times: RwLock<TimingStats>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }
}

/// Batch timing summary for the JSON stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTiming {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            tiles_sent: AtomicU64::new(0),
            tile_bytes_sent: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            canvas_requests: AtomicU64::new(0),
            batch_times: RwLock::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        let active = self.sessions_active.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("julia_sessions_opened_total").increment(1);
        gauge!("julia_sessions_active").set(active as f64);
    }

    pub fn record_session_closed(&self) {
        let active = self
            .sessions_active
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        gauge!("julia_sessions_active").set(active as f64);
    }

    pub fn record_tile_sent(&self, payload_bytes: usize) {
        self.tiles_sent.fetch_add(1, Ordering::Relaxed);
        self.tile_bytes_sent
            .fetch_add(payload_bytes as u64, Ordering::Relaxed);
        counter!("julia_tiles_sent_total").increment(1);
        counter!("julia_tile_bytes_sent_total").increment(payload_bytes as u64);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        counter!("julia_decode_failures_total").increment(1);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        counter!("julia_write_failures_total").increment(1);
    }

    pub fn record_canvas_request(&self) {
        self.canvas_requests.fetch_add(1, Ordering::Relaxed);
        counter!("julia_canvas_requests_total").increment(1);
    }

    /// Record a drained viewport batch.
    pub async fn record_batch(&self, elapsed: Duration) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        counter!("julia_batches_total").increment(1);
        histogram!("julia_batch_duration_seconds").record(elapsed.as_secs_f64());
        self.batch_times
            .write()
            .await
            .record(elapsed.as_micros() as u64);
    }

    pub async fn batch_timing(&self) -> BatchTiming {
        let times = self.batch_times.read().await;
        BatchTiming {
            count: times.count,
            avg_ms: times.avg_ms(),
            min_ms: times.min_us as f64 / 1000.0,
            max_ms: times.max_us as f64 / 1000.0,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Prometheus text for the values not recorded through the facade:
    /// uptime and the cache and scheduler snapshots.
    pub fn render_prometheus(
        &self,
        cache: &CacheStatsSnapshot,
        scheduler: &SchedulerStatsSnapshot,
    ) -> String {
        let mut out = String::new();

        write_metric(&mut out, "julia_uptime_seconds", "gauge", "Seconds since start", self.uptime_secs());
        write_metric(&mut out, "julia_tile_cache_entries", "gauge", "Cached tiles", cache.entry_count);
        write_metric(&mut out, "julia_tile_cache_bytes", "gauge", "Cached payload bytes", cache.size_bytes);
        write_metric(&mut out, "julia_tile_cache_hits", "counter", "Tile cache hits", cache.hits);
        write_metric(&mut out, "julia_tile_cache_misses", "counter", "Tile cache misses", cache.misses);
        write_metric(&mut out, "julia_tile_cache_evictions", "counter", "Tile cache evictions", cache.evictions);

        write_metric(&mut out, "julia_renders", "counter", "Completed evaluator passes", scheduler.renders);
        write_metric(&mut out, "julia_encode_failures", "counter", "Tiles dropped on encode failure", scheduler.encode_failures);
        write_metric(&mut out, "julia_cancelled_renders", "counter", "Renders stopped by cancellation", scheduler.cancelled);
        write_metric(&mut out, "julia_skipped_tiles", "counter", "Requested tiles outside the canvas", scheduler.skipped);

        out
    }
}

fn write_metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = write!(
        out,
        "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_timing() {
        let metrics = MetricsCollector::new();
        metrics.record_batch(Duration::from_millis(10)).await;
        metrics.record_batch(Duration::from_millis(30)).await;

        let timing = metrics.batch_timing().await;
        assert_eq!(timing.count, 2);
        assert!((timing.avg_ms - 20.0).abs() < 1e-9);
        assert!((timing.min_ms - 10.0).abs() < 1e-9);
        assert!((timing.max_ms - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_open_close_balances() {
        let metrics = MetricsCollector::new();
        metrics.record_session_opened();
        metrics.record_session_closed();
        assert_eq!(metrics.sessions_active.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.sessions_opened.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_text_format() {
        let metrics = MetricsCollector::new();
        let text = metrics.render_prometheus(
            &CacheStatsSnapshot {
                hits: 3,
                misses: 1,
                evictions: 0,
                entry_count: 1,
                size_bytes: 100,
                max_entries: 10,
                hit_rate: 75.0,
            },
            &SchedulerStatsSnapshot::default(),
        );
        assert!(text.contains("# TYPE julia_tile_cache_entries gauge\njulia_tile_cache_entries 1\n"));
        assert!(text.contains("julia_tile_cache_hits 3\n"));
    }
}
