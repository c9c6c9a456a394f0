//! Tile scheduling and fan-out.
//!
//! A batch is a list of tile requests against one [`RenderConfig`]. The
//! scheduler orders the list (coarse LOD first, then nearest the canvas
//! center), then a dispatcher walks it and spawns one task per tile once a
//! render permit is free. Each task serves from the shared [`TileCache`] or
//! renders on the blocking pool, encodes, caches and emits.
//!
//! Results arrive on a bounded channel in completion order. A task releases
//! its permit before it sends, so a full channel never holds render capacity.
//! The returned [`TileStream`] ends when the dispatcher and every task have
//! finished.

use bytes::Bytes;
use fractal_common::{Offset, RenderConfig, TileExtent, TileKey, TileRequest};
use futures::Stream;
use metrics::{counter, histogram};
use renderer::png::{encode_tile, EncodeError};
use renderer::{render_tile, Cancelled};
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use storage::{Tile, TileCache};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Scheduler counters. `renders` counts completed evaluator passes.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub renders: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub encode_failures: AtomicU64,
    pub cancelled: AtomicU64,
    pub skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub renders: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub encode_failures: u64,
    pub cancelled: u64,
    pub skipped: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            renders: self.renders.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Tiles of one batch, in completion order. Finite, not restartable.
pub struct TileStream {
    rx: mpsc::Receiver<Tile>,
}

impl Stream for TileStream {
    type Item = Tile;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Tile>> {
        self.rx.poll_recv(cx)
    }
}

/// Order requests by LOD ascending, then by squared distance from the tile
/// origin to the canvas center. Ties keep their input order.
pub fn prioritize(config: &RenderConfig, mut requests: Vec<TileRequest>) -> Vec<TileRequest> {
    requests.sort_by(|a, b| {
        a.lod.cmp(&b.lod).then_with(|| {
            a.distance_sq_to_center(config)
                .total_cmp(&b.distance_sq_to_center(config))
        })
    });
    requests
}

pub struct Scheduler {
    cache: Arc<TileCache>,
    permits: Arc<Semaphore>,
    tile_size: u32,
    channel_capacity: usize,
    stats: Arc<SchedulerStats>,
}

/// Everything a per-tile task needs, shared across the batch.
struct BatchContext {
    cache: Arc<TileCache>,
    stats: Arc<SchedulerStats>,
    config: RenderConfig,
    offset: Offset,
    tile_size: u32,
    cancel: CancellationToken,
}

enum RenderOutcome {
    Encoded(Vec<u8>),
    Cancelled,
    EncodeFailed(EncodeError),
}

impl Scheduler {
    /// `render_concurrency` bounds tile tasks in flight across every batch
    /// sharing this scheduler.
    pub fn new(
        cache: Arc<TileCache>,
        tile_size: u32,
        render_concurrency: usize,
        channel_capacity: usize,
    ) -> Self {
        Self {
            cache,
            permits: Arc::new(Semaphore::new(render_concurrency.max(1))),
            tile_size: tile_size.max(1),
            channel_capacity: channel_capacity.max(1),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Start a batch. Must be called inside a Tokio runtime.
    ///
    /// Cancelling `cancel` stops dispatch and makes in-flight renders give up
    /// at their next block row; cancelled renders are neither cached nor
    /// emitted.
    pub fn schedule(
        &self,
        config: RenderConfig,
        requests: Vec<TileRequest>,
        offset: Offset,
        cancel: CancellationToken,
    ) -> TileStream {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let ordered = prioritize(&config, requests);

        let ctx = Arc::new(BatchContext {
            cache: self.cache.clone(),
            stats: self.stats.clone(),
            config,
            offset,
            tile_size: self.tile_size,
            cancel,
        });

        tokio::spawn(dispatch(ctx, self.permits.clone(), ordered, tx));

        TileStream { rx }
    }
}

async fn dispatch(
    ctx: Arc<BatchContext>,
    permits: Arc<Semaphore>,
    ordered: Vec<TileRequest>,
    tx: mpsc::Sender<Tile>,
) {
    let total = ordered.len();
    let mut dispatched = 0usize;

    for request in ordered {
        let Some(extent) = TileExtent::clip(&ctx.config, request.x, request.y, ctx.tile_size)
        else {
            ctx.stats.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(x = request.x, y = request.y, "Skipping tile outside canvas");
            continue;
        };

        let permit = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        tokio::spawn(run_tile(ctx.clone(), request, extent, permit, tx.clone()));
        dispatched += 1;
    }

    debug!(total = total, dispatched = dispatched, "Batch dispatch finished");
}

async fn run_tile(
    ctx: Arc<BatchContext>,
    request: TileRequest,
    extent: TileExtent,
    permit: OwnedSemaphorePermit,
    tx: mpsc::Sender<Tile>,
) {
    let key = TileKey::new(
        &ctx.config,
        request.x,
        request.y,
        request.lod,
        ctx.offset,
        ctx.tile_size,
    );

    if let Some(tile) = ctx.cache.get(&key).await {
        ctx.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("julia_tile_cache_hits_total").increment(1);
        drop(permit);
        let _ = tx.send(tile).await;
        return;
    }
    ctx.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
    counter!("julia_tile_cache_misses_total").increment(1);

    if ctx.cancel.is_cancelled() {
        ctx.stats.cancelled.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let render_ctx = ctx.clone();
    let lod = request.lod;
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || {
        let token = render_ctx.cancel.clone();
        let cancelled = move || token.is_cancelled();
        match render_tile(&render_ctx.config, extent, lod, render_ctx.offset, &cancelled) {
            Ok(image) => {
                render_ctx.stats.renders.fetch_add(1, Ordering::Relaxed);
                match encode_tile(&image) {
                    Ok(png) => RenderOutcome::Encoded(png),
                    Err(e) => RenderOutcome::EncodeFailed(e),
                }
            }
            Err(Cancelled) => RenderOutcome::Cancelled,
        }
    })
    .await;

    let png = match outcome {
        Ok(RenderOutcome::Encoded(png)) => png,
        Ok(RenderOutcome::Cancelled) => {
            ctx.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Render cancelled");
            return;
        }
        Ok(RenderOutcome::EncodeFailed(e)) => {
            ctx.stats.encode_failures.fetch_add(1, Ordering::Relaxed);
            counter!("julia_encode_failures_total").increment(1);
            warn!(key = %key, error = %e, "Dropping tile after encode failure");
            return;
        }
        Err(e) => {
            error!(key = %key, error = %e, "Render task failed");
            return;
        }
    };
    histogram!("julia_tile_render_duration_seconds").record(started.elapsed().as_secs_f64());

    let tile = Tile {
        x: request.x,
        y: request.y,
        width: extent.width,
        height: extent.height,
        lod,
        image: Bytes::from(png),
    };

    ctx.cache.put(key, tile.clone()).await;

    // A slow consumer must only stall its own batch.
    drop(permit);
    let _ = tx.send(tile).await;
}
