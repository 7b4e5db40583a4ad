use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::tracking::{EventId, TrackedEvent};

pub struct CollectorState {
    /// Event ids seen within the dedup window
    seen: Cache<EventId, ()>,
}

impl CollectorState {
    pub fn new(dedup_ttl: Duration) -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(1_000_000)
                .time_to_live(dedup_ttl)
                .build(),
        }
    }

    pub fn has_seen(&self, event_id: &EventId) -> bool {
        self.seen.contains_key(event_id)
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub event_id: String,
}

/// Ingest one tracked event.
///
/// The body is decoded by hand so beacons sent with a non-JSON content type
/// are still accepted.
pub async fn ingest_event(
    State(state): State<Arc<CollectorState>>,
    body: Bytes,
) -> Response {
    let event: TrackedEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "rejected malformed tracking payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid tracking payload: {}", err),
                }),
            )
                .into_response();
        }
    };

    let entry = state.seen.entry(event.event_id()).or_insert(()).await;
    if !entry.is_fresh() {
        info!(event_id = %event.event_id(), "duplicate delivery ignored");
        return (
            StatusCode::OK,
            Json(IngestResponse {
                status: "duplicate",
                event_id: event.event_id().to_string(),
            }),
        )
            .into_response();
    }

    info!(
        event_id = %event.event_id(),
        event_name = event.event_name(),
        offer = event.offer(),
        merchant = event.merchant(),
        page_path = event.page_path(),
        out_url_domain = event.out_url_domain(),
        attribution_keys = event.attribution().len(),
        "tracking event accepted"
    );

    (
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted",
            event_id: event.event_id().to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
