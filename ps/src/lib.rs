//! planstream - streaming travel-plan generation client
//!
//! A prompt goes out over a WebSocket; the server streams back partial plans
//! until it says `completed`. Each partial plan replaces the previous one
//! wholesale, so the client only ever holds the latest snapshot.
//!
//! # Core Concepts
//!
//! - **One session per prompt**: a tokio task owns the socket from connect to close
//! - **Last write wins**: plan updates overwrite the snapshot, nothing is merged
//! - **Malformed input is contained**: bad frames are logged and counted, never fatal
//! - **Swappable transport**: sessions talk to a [`transport::Transport`], not a socket
//!
//! # Modules
//!
//! - [`session`] - connection manager, session handles, dispatcher
//! - [`protocol`] - wire message types
//! - [`transport`] - WebSocket and in-memory transports
//! - [`state`] - the plan-state sink and its in-memory store
//! - [`events`] - session event bus and JSONL event logs
//! - [`domain`] - plan view types and session IDs
//! - [`api`] - REST client for stored plans
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use api::{ApiError, ItineraryClient, ListQuery, Page, PlanSummary, SortOrder};
pub use config::Config;
pub use domain::{Day, Location, Plan, Step, StepKind, generate_session_id};
pub use protocol::{FrameError, InboundEvent, OutboundRequest, UpdateKind};
pub use session::{
    ClientError, ConnectionManager, ConnectionState, DispatchCounts, DispatchOutcome, DispatchStats, Dispatcher,
    Disposition, PlanClient, PlanSession, Teardown, dispatch_frames,
};
pub use state::{PlanSink, PlanState, PlanStore};
pub use transport::{
    Connection, Frame, MemoryListener, MemoryMode, MemoryPeer, MemoryTransport, Transport, TransportError,
    WebSocketTransport,
};

// Events module re-exports
pub use events::{
    CloseReason, EventBus, EventEmitter, EventLogEntry, EventLogger, SessionEvent, create_event_bus,
    read_session_events, recorded_frames, spawn_event_logger,
};
