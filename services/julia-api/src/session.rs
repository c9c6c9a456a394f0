//! Per-connection tile session.
//!
//! A session reads viewport updates from a [`Transport`], runs one batch per
//! update through the [`Scheduler`] and writes one [`TileMessage`] per tile.
//! Batches are sequential within a session; the next update is read only
//! after the current batch has drained.
//!
//! ```text
//! AwaitingMessage --frame--> Decoding --ok--> Streaming --drained--> AwaitingMessage
//!        |                      |                 |
//!        +--eof/close/error-----+--invalid--------+--write error--> Closed
//! ```

use async_trait::async_trait;
use base64::Engine as _;
use fractal_common::{
    parse_tile_list, viewport_tiles, FractalError, FractalResult, Offset, RenderConfig,
    TileRequest,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use storage::Tile;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::MetricsCollector;
use crate::scheduler::Scheduler;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(String),
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// A duplex message channel carrying text frames.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame, or `None` at end of stream.
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    async fn send(&mut self, text: String) -> Result<(), TransportError>;
}

/// Client request for one batch of tiles.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewportUpdate {
    pub config: RenderConfig,
    #[serde(default)]
    pub offset: Offset,
    /// `"x,y"` or `"x,y,lod"`. Absent means the whole canvas.
    #[serde(default)]
    pub tiles: Option<Vec<String>>,
}

/// A decoded, validated batch.
#[derive(Debug, Clone)]
pub struct Batch {
    pub config: RenderConfig,
    pub offset: Offset,
    pub requests: Vec<TileRequest>,
}

impl ViewportUpdate {
    pub fn from_json(text: &str) -> FractalResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate and expand into a batch. Tile lists inherit the config LOD.
    pub fn into_batch(self, tile_size: u32) -> FractalResult<Batch> {
        self.config.validate()?;
        self.offset.validate()?;

        let requests = match &self.tiles {
            Some(tiles) => parse_tile_list(tiles, self.config.lod)?,
            None => viewport_tiles(&self.config, tile_size),
        };

        Ok(Batch {
            config: self.config,
            offset: self.offset,
            requests,
        })
    }
}

/// Outbound message for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub lod: u32,
    /// Base64 (standard alphabet, padded) PNG.
    pub image: String,
}

impl From<&Tile> for TileMessage {
    fn from(tile: &Tile) -> Self {
        Self {
            kind: "tile".to_string(),
            x: tile.x,
            y: tile.y,
            width: tile.width,
            height: tile.height,
            lod: tile.lod,
            image: base64::engine::general_purpose::STANDARD.encode(&tile.image),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// End of stream or a close frame.
    ClientClosed,
    ReadFailed,
    DecodeFailed,
    WriteFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub batches: u64,
    pub tiles_sent: u64,
    pub reason: CloseReason,
}

enum SessionState {
    AwaitingMessage,
    Decoding(String),
    Streaming(Batch),
    Closed(CloseReason),
}

pub struct Session<T> {
    id: u64,
    transport: T,
    scheduler: Arc<Scheduler>,
    metrics: Arc<MetricsCollector>,
    batches: u64,
    tiles_sent: u64,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, scheduler: Arc<Scheduler>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            scheduler,
            metrics,
            batches: 0,
            tiles_sent: 0,
        }
    }

    /// Drive the session until the connection closes or fails.
    pub async fn run(mut self) -> SessionSummary {
        self.metrics.record_session_opened();
        info!(session = self.id, "Session opened");

        let mut state = SessionState::AwaitingMessage;
        let reason = loop {
            state = match state {
                SessionState::AwaitingMessage => self.await_message().await,
                SessionState::Decoding(text) => self.decode(&text),
                SessionState::Streaming(batch) => self.stream(batch).await,
                SessionState::Closed(reason) => break reason,
            };
        };

        self.metrics.record_session_closed();
        info!(
            session = self.id,
            batches = self.batches,
            tiles_sent = self.tiles_sent,
            reason = ?reason,
            "Session closed"
        );

        SessionSummary {
            batches: self.batches,
            tiles_sent: self.tiles_sent,
            reason,
        }
    }

    async fn await_message(&mut self) -> SessionState {
        match self.transport.recv().await {
            None | Some(Ok(Inbound::Close)) => SessionState::Closed(CloseReason::ClientClosed),
            Some(Ok(Inbound::Text(text))) => SessionState::Decoding(text),
            Some(Ok(Inbound::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => SessionState::Decoding(text),
                Err(e) => {
                    self.metrics.record_decode_failure();
                    warn!(session = self.id, error = %e, "Binary frame is not UTF-8");
                    SessionState::Closed(CloseReason::DecodeFailed)
                }
            },
            Some(Err(e)) => {
                debug!(session = self.id, error = %e, "Read failed");
                SessionState::Closed(CloseReason::ReadFailed)
            }
        }
    }

    fn decode(&mut self, text: &str) -> SessionState {
        match decode_update(text, self.scheduler.tile_size()) {
            Ok(batch) => SessionState::Streaming(batch),
            Err(e) => {
                self.metrics.record_decode_failure();
                warn!(session = self.id, error = %e, "Closing session on invalid message");
                SessionState::Closed(CloseReason::DecodeFailed)
            }
        }
    }

    async fn stream(&mut self, batch: Batch) -> SessionState {
        let started = Instant::now();
        let requested = batch.requests.len();
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        debug!(
            session = self.id,
            tiles = requested,
            lod = batch.config.lod,
            "Streaming batch"
        );

        let mut tiles =
            self.scheduler
                .schedule(batch.config, batch.requests, batch.offset, cancel.clone());

        while let Some(tile) = tiles.next().await {
            let message = TileMessage::from(&tile);
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(session = self.id, error = %e, "Dropping unserializable tile");
                    continue;
                }
            };

            if let Err(e) = self.transport.send(text).await {
                cancel.cancel();
                self.metrics.record_write_failure();
                warn!(session = self.id, error = %e, "Write failed, cancelling batch");
                return SessionState::Closed(CloseReason::WriteFailed);
            }

            self.tiles_sent += 1;
            self.metrics.record_tile_sent(tile.image.len());
        }

        self.batches += 1;
        self.metrics.record_batch(started.elapsed()).await;
        debug!(
            session = self.id,
            requested = requested,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch drained"
        );

        SessionState::AwaitingMessage
    }
}

/// Parse, validate and expand one inbound message.
pub fn decode_update(text: &str, tile_size: u32) -> Result<Batch, FractalError> {
    ViewportUpdate::from_json(text)?.into_batch(tile_size)
}
