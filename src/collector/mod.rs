//! First-party ingestion endpoint for tracked events
//!
//! Accepts the flat JSON bodies posted by the tracker, rejects malformed
//! ones, and drops repeat deliveries of the same `event_id` within the
//! dedup window. Nothing is persisted; accepted events are logged.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::CollectorState;
pub use routes::{create_collector_router, TRACK_PATH};
