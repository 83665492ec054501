//! Event Bus - pub/sub for plan-session events
//!
//! Sessions emit, consumers (CLI output, the JSONL logger) subscribe.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{CloseReason, SessionEvent};
use crate::protocol::UpdateKind;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Central event bus for session activity
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped. Slow subscribers lose the oldest events.
    pub fn emit(&self, event: SessionEvent) {
        debug!(
            event_type = event.event_type(),
            session_id = event.session_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to one session
    pub fn emitter_for(&self, session_id: impl Into<String>) -> EventEmitter {
        let session_id = session_id.into();
        debug!(%session_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: Some(self.tx.clone()),
            session_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap, cloneable handle for emitting one session's events
///
/// A detached emitter (no bus) swallows everything, so callers never branch on
/// whether observability is wired up.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: Option<broadcast::Sender<SessionEvent>>,
    session_id: String,
}

impl EventEmitter {
    /// An emitter that goes nowhere
    pub fn detached(session_id: impl Into<String>) -> Self {
        Self {
            tx: None,
            session_id: session_id.into(),
        }
    }

    /// Get the session ID this emitter is bound to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            debug!(event_type = event.event_type(), "EventEmitter::emit");
            let _ = tx.send(event);
        }
    }

    // === Convenience methods ===

    pub fn connecting(&self, url: &str) {
        self.emit(SessionEvent::Connecting {
            session_id: self.session_id.clone(),
            url: url.to_string(),
        });
    }

    pub fn opened(&self) {
        self.emit(SessionEvent::Opened {
            session_id: self.session_id.clone(),
        });
    }

    pub fn closed(&self, reason: CloseReason) {
        self.emit(SessionEvent::Closed {
            session_id: self.session_id.clone(),
            reason,
        });
    }

    pub fn prompt_sent(&self, prompt: &str) {
        self.emit(SessionEvent::PromptSent {
            session_id: self.session_id.clone(),
            prompt: prompt.to_string(),
        });
    }

    pub fn frame_received(&self, raw: &str) {
        self.emit(SessionEvent::FrameReceived {
            session_id: self.session_id.clone(),
            raw: raw.to_string(),
        });
    }

    pub fn snapshot_replaced(&self, kind: UpdateKind) {
        self.emit(SessionEvent::SnapshotReplaced {
            session_id: self.session_id.clone(),
            kind,
        });
    }

    pub fn status(&self, message: &str) {
        self.emit(SessionEvent::Status {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn progress(&self, message: &str) {
        self.emit(SessionEvent::Progress {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn server_error(&self, message: &str) {
        self.emit(SessionEvent::ServerError {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }

    pub fn frame_dropped(&self, reason: &str) {
        self.emit(SessionEvent::FrameDropped {
            session_id: self.session_id.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn frame_unrecognized(&self, kind: &str) {
        self.emit(SessionEvent::FrameUnrecognized {
            session_id: self.session_id.clone(),
            kind: kind.to_string(),
        });
    }

    pub fn completed(&self) {
        self.emit(SessionEvent::Completed {
            session_id: self.session_id.clone(),
        });
    }

    pub fn transport_error(&self, message: &str) {
        self.emit(SessionEvent::TransportError {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
