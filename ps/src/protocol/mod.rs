//! Wire protocol for the plan-generation socket
//!
//! JSON text frames in both directions. The client sends exactly one
//! [`OutboundRequest`] per connection; the server answers with a stream of
//! [`InboundEvent`]s discriminated by a `type` field.

pub mod messages;

pub use messages::{FrameError, InboundEvent, OutboundRequest, UpdateKind, is_present};
