//! Plan sessions
//!
//! - [`PlanClient`] opens sessions against one endpoint
//! - [`PlanSession`] is a handle to one running connection
//! - [`ConnectionManager`] keeps at most one of them current
//! - [`Dispatcher`] turns inbound frames into plan-state updates

mod connection;
mod dispatcher;
mod manager;

pub use connection::{ClientError, ConnectionState, PlanClient, PlanSession};
pub use dispatcher::{DispatchCounts, DispatchOutcome, DispatchStats, Dispatcher, Disposition, dispatch_frames};
pub use manager::{ConnectionManager, Teardown};
