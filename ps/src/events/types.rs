//! Event types for plan-session activity
//!
//! Everything observable about a session is one of these:
//! - connection lifecycle (connecting, opened, closed)
//! - traffic (prompt sent, raw frame received)
//! - dispatch outcomes (snapshot replaced, status, dropped or unrecognized frames)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::UpdateKind;

/// Core event enum - the vocabulary of session activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    // === Connection Lifecycle ===
    /// The session started opening its transport (token redacted from `url`)
    Connecting { session_id: String, url: String },
    /// The transport is open
    Opened { session_id: String },
    /// The session is closed and will not dispatch again
    Closed { session_id: String, reason: CloseReason },

    // === Traffic ===
    /// The generation request went out
    PromptSent { session_id: String, prompt: String },
    /// A text frame arrived, before classification
    FrameReceived { session_id: String, raw: String },

    // === Dispatch ===
    /// The plan snapshot was overwritten
    SnapshotReplaced { session_id: String, kind: UpdateKind },
    /// Server status line
    Status { session_id: String, message: String },
    /// Server progress line
    Progress { session_id: String, message: String },
    /// The server reported an application error
    ServerError { session_id: String, message: String },
    /// Frame could not be parsed and was dropped
    FrameDropped { session_id: String, reason: String },
    /// Frame had a `type` tag the client does not know
    FrameUnrecognized { session_id: String, kind: String },
    /// Generation complete
    Completed { session_id: String },

    // === Errors ===
    /// The transport failed (connect or mid-stream)
    TransportError { session_id: String, message: String },
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Server sent `completed`
    Completed,
    /// Caller closed, disconnected, or dropped every handle
    Cancelled,
    /// Server closed the connection
    RemoteClosed,
    /// Transport error
    Failed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::RemoteClosed => "remote_closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl SessionEvent {
    /// Get the session ID for this event
    pub fn session_id(&self) -> &str {
        match self {
            Self::Connecting { session_id, .. }
            | Self::Opened { session_id }
            | Self::Closed { session_id, .. }
            | Self::PromptSent { session_id, .. }
            | Self::FrameReceived { session_id, .. }
            | Self::SnapshotReplaced { session_id, .. }
            | Self::Status { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::ServerError { session_id, .. }
            | Self::FrameDropped { session_id, .. }
            | Self::FrameUnrecognized { session_id, .. }
            | Self::Completed { session_id }
            | Self::TransportError { session_id, .. } => session_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connecting { .. } => "Connecting",
            Self::Opened { .. } => "Opened",
            Self::Closed { .. } => "Closed",
            Self::PromptSent { .. } => "PromptSent",
            Self::FrameReceived { .. } => "FrameReceived",
            Self::SnapshotReplaced { .. } => "SnapshotReplaced",
            Self::Status { .. } => "Status",
            Self::Progress { .. } => "Progress",
            Self::ServerError { .. } => "ServerError",
            Self::FrameDropped { .. } => "FrameDropped",
            Self::FrameUnrecognized { .. } => "FrameUnrecognized",
            Self::Completed { .. } => "Completed",
            Self::TransportError { .. } => "TransportError",
        }
    }

    /// Whether this is the last event a session emits
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: SessionEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: SessionEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_session_id() {
        let event = SessionEvent::PromptSent {
            session_id: "s-123".to_string(),
            prompt: "5 days in Pokhara".to_string(),
        };
        assert_eq!(event.session_id(), "s-123");
        assert_eq!(event.event_type(), "PromptSent");
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::SnapshotReplaced {
            session_id: "s-1".to_string(),
            kind: UpdateKind::DayAdded,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"SnapshotReplaced""#));
        assert!(json.contains(r#""kind":"day_added""#));

        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_closed_is_final() {
        let closed = SessionEvent::Closed {
            session_id: "s".to_string(),
            reason: CloseReason::Completed,
        };
        assert!(closed.is_final());
        assert!(!SessionEvent::Opened { session_id: "s".to_string() }.is_final());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::RemoteClosed.to_string(), "remote_closed");
        assert_eq!(CloseReason::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_event_log_entry() {
        let entry = EventLogEntry::new(SessionEvent::Opened {
            session_id: "s-9".to_string(),
        });
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("ts"));
        assert!(json.contains("Opened"));
    }
}
