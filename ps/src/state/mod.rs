//! Plan state
//!
//! The session layer writes through the [`PlanSink`] trait; [`PlanStore`] is
//! the in-memory implementation the CLI and tests read from.

mod store;

pub use store::{PlanSink, PlanState, PlanStore};
