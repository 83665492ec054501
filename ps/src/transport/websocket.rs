//! WebSocket transport over `tokio-tungstenite`

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use reqwest::Url;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::{Connection, Frame, Transport, TransportError};

/// Connects to `ws://` and `wss://` endpoints
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    connect_timeout: Option<Duration>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the opening handshake; an open connection is never timed out
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<Connection, TransportError> {
        debug!(host = ?url.host_str(), path = url.path(), "WebSocketTransport::connect: called");

        let handshake = connect_async(url.as_str());
        let (ws, response) = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| TransportError::Timeout(timeout))??,
            None => handshake.await?,
        };
        debug!(status = %response.status(), "WebSocketTransport::connect: handshake complete");

        let (ws_tx, ws_rx) = ws.split();

        let sink = ws_tx.with(|frame: Frame| future::ready(Ok::<_, TransportError>(to_message(frame))));
        let stream = ws_rx.filter_map(|msg| future::ready(from_message(msg)));

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Close => Message::Close(None),
    }
}

/// Ping/pong stay inside tungstenite; binary payloads are surfaced as text
/// so the dispatcher can reject them like any other malformed frame.
fn from_message(msg: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<Result<Frame, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Frame::Text(String::from_utf8_lossy(&bytes).into_owned()))),
        Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::from(e))),
    }
}
