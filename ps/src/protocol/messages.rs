//! Plan socket message types
//!
//! One JSON object per text frame. Outbound is a single `{"prompt": ...}`;
//! inbound frames carry a required `type` tag plus optional `response`
//! (plan payload) and `message` (human-readable text).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Initial generation request, sent once right after the socket opens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundRequest {
    pub prompt: String,
}

impl OutboundRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into() }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why an inbound frame could not be classified
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame has no string `type` field")]
    MissingType,
}

/// The three server events that carry a replacement plan snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    PlanCreated,
    DayAdded,
    StepAdded,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanCreated => "plan_created",
            Self::DayAdded => "day_added",
            Self::StepAdded => "step_added",
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `plan_created`, `day_added` or `step_added`
    PlanUpdate { kind: UpdateKind, response: Option<Value> },

    /// Generation finished; the client closes the socket
    Completed,

    /// Server-reported application error; the socket stays open
    Error {
        message: Option<String>,
        response: Option<Value>,
    },

    Status { message: Option<String> },

    Progress { message: Option<String> },

    /// Any other `type` tag
    Unrecognized { kind: String },
}

impl InboundEvent {
    /// Parse and classify a raw text frame
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        debug!(len = raw.len(), "InboundEvent::parse: called");
        let value: Value = serde_json::from_str(raw)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?;
        let response = value.get("response").filter(|v| !v.is_null()).cloned();
        let message = value.get("message").and_then(message_text);

        let event = match kind {
            "plan_created" => Self::PlanUpdate {
                kind: UpdateKind::PlanCreated,
                response,
            },
            "day_added" => Self::PlanUpdate {
                kind: UpdateKind::DayAdded,
                response,
            },
            "step_added" => Self::PlanUpdate {
                kind: UpdateKind::StepAdded,
                response,
            },
            "completed" => Self::Completed,
            "error" => Self::Error { message, response },
            "status" => Self::Status { message },
            "progress" => Self::Progress { message },
            other => {
                debug!(%other, "InboundEvent::parse: unrecognized type");
                Self::Unrecognized { kind: other.to_string() }
            }
        };

        Ok(event)
    }

    /// The wire `type` tag this event was parsed from
    pub fn kind(&self) -> &str {
        match self {
            Self::PlanUpdate { kind, .. } => kind.as_str(),
            Self::Completed => "completed",
            Self::Error { .. } => "error",
            Self::Status { .. } => "status",
            Self::Progress { .. } => "progress",
            Self::Unrecognized { kind } => kind,
        }
    }

    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// JS-style truthiness for plan payloads: null, false, 0 and "" count as absent
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
