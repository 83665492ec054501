//! In-process transport
//!
//! Each `connect` produces a [`MemoryPeer`] delivered to the [`MemoryListener`],
//! which plays the server side: it reads what the client sent and pushes frames
//! back. Used by the test suites and by offline tooling.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{FutureExt, SinkExt, StreamExt};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Connection, Frame, Transport, TransportError};

/// How the next `connect` calls behave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MemoryMode {
    /// Open immediately and hand a peer to the listener
    #[default]
    Accept,
    /// Fail with `TransportError::Refused`
    Refuse(String),
    /// Never resolve; the session stays CONNECTING until cancelled
    Pending,
}

#[derive(Debug, Default)]
struct Shared {
    mode: MemoryMode,
    urls: Vec<Url>,
}

/// Transport whose "server" lives in the same process
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Receives one [`MemoryPeer`] per accepted connection
#[derive(Debug)]
pub struct MemoryListener {
    peers_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryListener) {
        debug!("MemoryTransport::new: called");
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let transport = Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            peers_tx,
        };
        (transport, MemoryListener { peers_rx })
    }

    /// Change how subsequent connections behave
    pub fn set_mode(&self, mode: MemoryMode) {
        debug!(?mode, "MemoryTransport::set_mode: called");
        self.shared.lock().unwrap_or_else(PoisonError::into_inner).mode = mode;
    }

    /// Every URL `connect` was called with, in order
    pub fn urls(&self) -> Vec<Url> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner).urls.clone()
    }

    /// Number of connection attempts so far
    pub fn connect_count(&self) -> usize {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner).urls.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &Url) -> Result<Connection, TransportError> {
        debug!(path = url.path(), "MemoryTransport::connect: called");
        let mode = {
            let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.urls.push(url.clone());
            shared.mode.clone()
        };

        match mode {
            MemoryMode::Accept => {}
            MemoryMode::Refuse(reason) => {
                debug!(%reason, "MemoryTransport::connect: refusing");
                return Err(TransportError::Refused(reason));
            }
            MemoryMode::Pending => {
                debug!("MemoryTransport::connect: holding connection pending");
                futures::future::pending::<()>().await;
            }
        }

        let (client_tx, server_rx) = fmpsc::unbounded::<Frame>();
        let (server_tx, client_rx) = fmpsc::unbounded::<Result<Frame, TransportError>>();

        let peer = MemoryPeer {
            url: url.clone(),
            outbound: server_rx,
            inbound: Some(server_tx),
        };
        self.peers_tx.send(peer).map_err(|_| TransportError::Refused("listener dropped".to_string()))?;

        Ok(Connection {
            sink: Box::pin(client_tx.sink_map_err(|_| TransportError::Closed)),
            stream: Box::pin(client_rx),
        })
    }
}

impl MemoryListener {
    /// Wait for the next accepted connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers_rx.recv().await
    }

    /// Take an already-accepted connection without waiting
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers_rx.try_recv().ok()
    }
}

/// Server side of one in-memory connection
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    outbound: fmpsc::UnboundedReceiver<Frame>,
    inbound: Option<fmpsc::UnboundedSender<Result<Frame, TransportError>>>,
}

impl MemoryPeer {
    /// URL the client connected to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Next frame the client sent; `None` once the client dropped its sink
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.next().await
    }

    /// Next client frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.outbound.next().now_or_never().flatten()
    }

    /// Push a raw text frame to the client
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(Frame::Text(text.into())))
    }

    /// Push a JSON value as a text frame
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Send a close frame and hang up
    pub fn close(&mut self) {
        debug!("MemoryPeer::close: called");
        let _ = self.push(Ok(Frame::Close));
        self.inbound = None;
    }

    /// Surface a transport error to the client and hang up
    pub fn fail(&mut self, message: &str) {
        debug!(%message, "MemoryPeer::fail: called");
        let _ = self.push(Err(TransportError::Failure(message.to_string())));
        self.inbound = None;
    }

    /// Whether the client side has stopped listening
    pub fn is_client_gone(&self) -> bool {
        self.inbound.as_ref().is_none_or(|tx| tx.is_closed())
    }

    fn push(&self, item: Result<Frame, TransportError>) -> bool {
        match &self.inbound {
            Some(tx) => tx.unbounded_send(item).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://memory/plan?token=t").unwrap()
    }

    #[tokio::test]
    async fn test_connect_delivers_peer() {
        let (transport, mut listener) = MemoryTransport::new();
        let mut conn = transport.connect(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();
        assert_eq!(peer.url().path(), "/plan");

        conn.sink.send(Frame::text("hello")).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::text("hello")));

        assert!(peer.send_text("world"));
        let got = conn.stream.next().await.unwrap().unwrap();
        assert_eq!(got, Frame::text("world"));
    }

    #[tokio::test]
    async fn test_refuse_mode() {
        let (transport, mut listener) = MemoryTransport::new();
        transport.set_mode(MemoryMode::Refuse("nope".to_string()));
        let err = transport.connect(&url()).await.err().unwrap();
        assert!(matches!(err, TransportError::Refused(reason) if reason == "nope"));
        assert!(listener.try_accept().is_none());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (transport, mut listener) = MemoryTransport::new();
        let mut conn = transport.connect(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        peer.close();
        assert_eq!(conn.stream.next().await.unwrap().unwrap(), Frame::Close);
        assert!(conn.stream.next().await.is_none());
        assert!(!peer.send_text("late"));
    }

    #[tokio::test]
    async fn test_client_drop_visible_to_peer() {
        let (transport, mut listener) = MemoryTransport::new();
        let conn = transport.connect(&url()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();
        assert!(!peer.is_client_gone());

        drop(conn);
        assert!(peer.is_client_gone());
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_urls_recorded() {
        let (transport, _listener) = MemoryTransport::new();
        let _ = transport.connect(&url()).await.unwrap();
        assert_eq!(transport.urls(), vec![url()]);
    }
}
