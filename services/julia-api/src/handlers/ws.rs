//! WebSocket endpoint for streaming tile sessions.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

use crate::session::{Inbound, Session, Transport, TransportError};
use crate::state::AppState;

/// GET /ws - Upgrade to a tile session.
#[instrument(skip(upgrade, state))]
pub async fn ws_handler(
    upgrade: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        let session = Session::new(
            WebSocketTransport::new(socket),
            state.scheduler.clone(),
            state.metrics.clone(),
        );
        session.run().await;
    })
}

/// [`Transport`] over an axum WebSocket. Ping and pong frames are handled
/// by the socket and never reach the session.
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let frame = match self.socket.recv().await? {
                Ok(Message::Text(text)) => Inbound::Text(text),
                Ok(Message::Binary(bytes)) => Inbound::Binary(bytes),
                Ok(Message::Close(_)) => Inbound::Close,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
