//! Frame transports for the plan socket
//!
//! A [`Transport`] opens a bidirectional channel of text [`Frame`]s to a URL.
//! The session layer only ever sees frames, so the WebSocket implementation
//! can be swapped for the in-memory one in tests.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, Stream};
use reqwest::Url;
use thiserror::Error;

pub mod memory;
pub mod websocket;

pub use memory::{MemoryListener, MemoryMode, MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;

/// A unit of traffic on the plan socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON-encoded text frame
    Text(String),
    /// Close handshake from either side
    Close,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Close => None,
        }
    }
}

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connect timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Transport failure: {0}")]
    Failure(String),

    #[error("Connection closed")]
    Closed,
}

/// Outbound half of an open connection
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Inbound half of an open connection
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// An open connection, split into its two halves
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens frame connections
///
/// `connect` resolves once the connection is open (the equivalent of the
/// socket's open event) or fails with the reason it could not be opened.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Connection, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_as_text() {
        assert_eq!(Frame::text("hi").as_text(), Some("hi"));
        assert_eq!(Frame::Close.as_text(), None);
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "Connect timeout after 3s");
        assert_eq!(TransportError::Closed.to_string(), "Connection closed");
    }
}
