//! Domain types
//!
//! - [`Plan`] and friends: read-only view over a plan snapshot
//! - session ID generation

mod id;
mod plan;

pub use id::generate_session_id;
pub use plan::{Day, Location, Plan, Step, StepKind};
