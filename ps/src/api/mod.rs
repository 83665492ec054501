//! Itinerary REST API
//!
//! Read access to plans the backend has already stored.

mod client;
mod error;
mod types;

pub use client::ItineraryClient;
pub use error::ApiError;
pub use types::{DEFAULT_LIMIT, DEFAULT_PAGE, ListQuery, Page, PlanSummary, SortOrder};
