//! Event bus for live session observability
//!
//! Every session emits its lifecycle, its traffic and each dispatch outcome to
//! a broadcast bus. Consumers (CLI progress output, the JSONL logger) subscribe.
//!
//! ```text
//!   PlanSession task ──emit──► EventBus (tokio broadcast) ──► CLI status lines
//!                                                        └──► EventLogger (.jsonl)
//! ```
//!
//! Dropped and unrecognized frames are reported here as well as counted in
//! the session's `DispatchStats`.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, read_session_events, recorded_frames, spawn_event_logger};
pub use types::{CloseReason, EventLogEntry, SessionEvent};
