use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers::{health_check, ingest_event, CollectorState};
use super::middleware::log_request_timing;

/// Path the tracker posts to when no collector URL is configured
pub const TRACK_PATH: &str = "/api/track";

pub fn create_collector_router(state: Arc<CollectorState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route(TRACK_PATH, post(ingest_event))
        .layer(middleware::from_fn(log_request_timing))
        .with_state(state)
}
