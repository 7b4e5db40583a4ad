//! Fan-out of a composed event to every configured collector
//!
//! Dispatch never fails and never awaits network I/O. Each collector is
//! attempted independently; failures are logged and swallowed.

use reqwest::Url;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::event::TrackedEvent;
use super::tag::AnalyticsTag;
use super::transport::{BeaconTransport, KeepaliveTransport};
use crate::error::TrackingError;

/// How the first-party payload left the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryDelivery {
    /// No primary collector configured
    NotConfigured,
    /// Accepted by the beacon transport
    Beacon,
    /// Handed to a detached keep-alive request
    Keepalive,
    /// Could not even be attempted (bad endpoint, no runtime); already logged
    Skipped,
}

/// What was attempted for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub primary: PrimaryDelivery,
    pub tags_attempted: usize,
    pub tags_failed: usize,
}

/// First-party ingestion endpoint and the transports that reach it
pub struct PrimaryCollector {
    endpoint: String,
    beacon: Option<Arc<dyn BeaconTransport>>,
    fallback: Arc<dyn KeepaliveTransport>,
}

impl PrimaryCollector {
    /// `endpoint` may be absolute or a path resolved against the page URL.
    pub fn new(endpoint: impl Into<String>, fallback: Arc<dyn KeepaliveTransport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            beacon: None,
            fallback,
        }
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn resolve_endpoint(&self, page_url: &Url) -> Result<Url, TrackingError> {
        page_url
            .join(&self.endpoint)
            .map_err(|_| TrackingError::UnresolvableEndpoint {
                endpoint: self.endpoint.clone(),
                base: page_url.to_string(),
            })
    }
}

#[derive(Default)]
pub struct Dispatcher {
    primary: Option<PrimaryCollector>,
    tags: Vec<Arc<dyn AnalyticsTag>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, primary: PrimaryCollector) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_tag(mut self, tag: Arc<dyn AnalyticsTag>) -> Self {
        self.tags.push(tag);
        self
    }

    /// Send `event` to every collector. `page_url` anchors relative endpoints.
    pub fn dispatch(&self, event: &TrackedEvent, page_url: &Url) -> DispatchReport {
        let primary = match &self.primary {
            Some(collector) => self.send_primary(collector, event, page_url),
            None => PrimaryDelivery::NotConfigured,
        };

        let mut tags_failed = 0;
        for tag in &self.tags {
            if let Err(err) = tag.record(event) {
                tags_failed += 1;
                warn!(
                    tag = tag.name(),
                    event_id = %event.event_id(),
                    error = %err,
                    "analytics tag failed"
                );
            }
        }

        DispatchReport {
            primary,
            tags_attempted: self.tags.len(),
            tags_failed,
        }
    }

    fn send_primary(
        &self,
        collector: &PrimaryCollector,
        event: &TrackedEvent,
        page_url: &Url,
    ) -> PrimaryDelivery {
        let endpoint = match collector.resolve_endpoint(page_url) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!(error = %err, "primary collector skipped");
                return PrimaryDelivery::Skipped;
            }
        };
        let body = event.to_json();

        if let Some(beacon) = &collector.beacon {
            if beacon.send_beacon(&endpoint, body.clone()) {
                debug!(event_id = %event.event_id(), "event queued as beacon");
                return PrimaryDelivery::Beacon;
            }
            debug!(event_id = %event.event_id(), "beacon refused, falling back to keep-alive request");
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(error = %TrackingError::NoRuntime, "primary collector skipped");
            return PrimaryDelivery::Skipped;
        };
        let fallback = Arc::clone(&collector.fallback);
        let event_id = event.event_id();
        runtime.spawn(async move {
            if let Err(err) = fallback.post_json(endpoint, body).await {
                warn!(event_id = %event_id, error = %err, "keep-alive tracking request failed");
            }
        });
        PrimaryDelivery::Keepalive
    }
}
