//! Plan sessions - one streaming connection per prompt
//!
//! [`PlanClient::start`] spawns a task that owns the socket for its whole
//! lifetime. The returned [`PlanSession`] is a cheap handle to that task:
//! state reads go through a `watch`, sends and close requests through
//! channels. Dropping every handle closes the session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::dispatcher::{DispatchStats, Dispatcher, Disposition};
use crate::domain::generate_session_id;
use crate::events::{CloseReason, EventBus, EventEmitter};
use crate::protocol::OutboundRequest;
use crate::state::PlanSink;
use crate::transport::{Connection, Frame, Transport};

/// Queued outbound messages per session
const SEND_QUEUE_CAPACITY: usize = 64;

/// How long to wait for our close frame to go out
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors building a client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Starts plan sessions against one endpoint
#[derive(Clone)]
pub struct PlanClient {
    endpoint: Url,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn PlanSink>,
    events: Option<Arc<EventBus>>,
}

impl PlanClient {
    /// Create a client for a `ws://` or `wss://` endpoint
    pub fn new(endpoint: &str, transport: Arc<dyn Transport>, sink: Arc<dyn PlanSink>) -> Result<Self, ClientError> {
        debug!(%endpoint, "PlanClient::new: called");
        let url = Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(Self {
            endpoint: url,
            transport,
            sink,
            events: None,
        })
    }

    /// Publish session activity on an event bus
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint with the auth token appended as a query parameter
    ///
    /// Existing query parameters are kept.
    pub fn endpoint_for(&self, token: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("token", token);
        url
    }

    /// Open a session for `prompt`
    ///
    /// Returns immediately with the session in CONNECTING. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, prompt: &str, token: &str) -> PlanSession {
        let id = generate_session_id(prompt);
        debug!(session_id = %id, "PlanClient::start: called");

        let emitter = match &self.events {
            Some(bus) => bus.emitter_for(id.clone()),
            None => EventEmitter::detached(id.clone()),
        };
        let dispatcher = Dispatcher::new(self.sink.clone(), emitter.clone());
        let stats = dispatcher.stats().clone();

        let (cmd_tx, cmd_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (close_tx, close_rx) = watch::channel(false);

        let task = SessionTask {
            url: self.endpoint_for(token),
            prompt: prompt.to_string(),
            transport: self.transport.clone(),
            dispatcher,
            emitter,
            state_tx,
            cmd_rx,
            close_rx,
        };
        tokio::spawn(task.run());

        PlanSession {
            id,
            cmd_tx,
            close_tx: Arc::new(close_tx),
            state_rx,
            stats,
        }
    }
}

/// Handle to a running session
#[derive(Clone)]
pub struct PlanSession {
    id: String,
    cmd_tx: mpsc::Sender<String>,
    close_tx: Arc<watch::Sender<bool>>,
    state_rx: watch::Receiver<ConnectionState>,
    stats: Arc<DispatchStats>,
}

impl fmt::Debug for PlanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl PlanSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Serialize and queue a message
    ///
    /// Returns false without side effects unless the session is OPEN.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        if !self.is_open() {
            debug!(session_id = %self.id, state = %self.state(), "send: session not open");
            return false;
        }
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "send: failed to serialize message");
                return false;
            }
        };
        match self.cmd_tx.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "send: queue rejected message");
                false
            }
        }
    }

    /// Request close; does not wait for the acknowledgement
    pub fn close(&self) {
        debug!(session_id = %self.id, "PlanSession::close: called");
        self.close_tx.send_replace(true);
    }

    /// Wait until the session reaches CLOSED
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }
}

/// The task that owns the socket
struct SessionTask {
    url: Url,
    prompt: String,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    emitter: EventEmitter,
    state_tx: watch::Sender<ConnectionState>,
    cmd_rx: mpsc::Receiver<String>,
    close_rx: watch::Receiver<bool>,
}

impl SessionTask {
    async fn run(self) {
        let SessionTask {
            url,
            prompt,
            transport,
            dispatcher,
            emitter,
            state_tx,
            mut cmd_rx,
            mut close_rx,
        } = self;
        let session_id = emitter.session_id().to_string();

        let finish = |reason: CloseReason| {
            state_tx.send_replace(ConnectionState::Closed);
            info!(%session_id, %reason, "Session closed");
            emitter.closed(reason);
        };

        // Closed before the task got to run
        if *close_rx.borrow() {
            finish(CloseReason::Cancelled);
            return;
        }

        emitter.connecting(&redact_token(&url));
        info!(%session_id, endpoint = %redact_token(&url), "Connecting");

        let connected = tokio::select! {
            biased;
            _ = close_requested(&mut close_rx) => None,
            result = transport.connect(&url) => Some(result),
        };

        let Connection { mut sink, mut stream } = match connected {
            None => {
                debug!(%session_id, "run: closed while connecting");
                finish(CloseReason::Cancelled);
                return;
            }
            Some(Err(e)) => {
                warn!(%session_id, error = %e, "Connection failed");
                emitter.transport_error(&e.to_string());
                finish(CloseReason::Failed);
                return;
            }
            Some(Ok(connection)) => connection,
        };

        state_tx.send_replace(ConnectionState::Open);
        info!(%session_id, "Connection open");
        emitter.opened();

        let request = match OutboundRequest::new(prompt.as_str()).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(%session_id, error = %e, "Failed to encode prompt");
                emitter.transport_error(&e.to_string());
                finish(CloseReason::Failed);
                return;
            }
        };
        if let Err(e) = sink.send(Frame::Text(request)).await {
            warn!(%session_id, error = %e, "Failed to send prompt");
            emitter.transport_error(&e.to_string());
            finish(CloseReason::Failed);
            return;
        }
        emitter.prompt_sent(&prompt);

        let reason = loop {
            tokio::select! {
                biased;
                _ = close_requested(&mut close_rx) => break CloseReason::Cancelled,
                cmd = cmd_rx.recv() => match cmd {
                    Some(text) => {
                        if let Err(e) = sink.send(Frame::Text(text)).await {
                            warn!(%session_id, error = %e, "Send failed");
                            emitter.transport_error(&e.to_string());
                            break CloseReason::Failed;
                        }
                    }
                    None => break CloseReason::Cancelled,
                },
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(raw))) => {
                        if dispatcher.handle_frame(&raw) == Disposition::Complete {
                            break CloseReason::Completed;
                        }
                    }
                    Some(Ok(Frame::Close)) | None => break CloseReason::RemoteClosed,
                    Some(Err(e)) => {
                        warn!(%session_id, error = %e, "Transport error");
                        emitter.transport_error(&e.to_string());
                        break CloseReason::Failed;
                    }
                },
            }
        };

        if matches!(reason, CloseReason::Completed | CloseReason::Cancelled) {
            state_tx.send_replace(ConnectionState::Closing);
            if tokio::time::timeout(CLOSE_GRACE, sink.send(Frame::Close)).await.is_err() {
                debug!(%session_id, "run: close frame timed out");
            }
        }
        finish(reason);
    }
}

/// Resolves once close is requested or every handle is gone
async fn close_requested(close_rx: &mut watch::Receiver<bool>) {
    let _ = close_rx.wait_for(|closed| *closed).await;
}

/// Endpoint with the token value masked, for logs and events
fn redact_token(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    let mut redacted = url.clone();
    if !pairs.is_empty() {
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    redacted.to_string()
}
