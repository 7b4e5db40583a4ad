//! Tracked event record and the pure composer that builds it

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::attribution::Attribution;
use super::classifier::ClassifiedLink;
use super::identity::EventId;
use crate::page::PageContext;

/// JSON names of the fixed fields. Attribution keys never override these.
const RESERVED_FIELDS: &[&str] = &[
    "event_id",
    "event_name",
    "offer",
    "merchant",
    "position",
    "price",
    "action",
    "page_path",
    "link_url",
    "out_url_domain",
    "timestamp",
    "user_agent",
];

/// One qualifying click, serialized as a flat JSON object.
///
/// Fields are read-only once composed; attribution parameters are merged at
/// the top level of the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    event_id: EventId,
    event_name: String,
    offer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    merchant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    position: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    price: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    action: String,
    page_path: String,
    link_url: String,
    out_url_domain: String,
    timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(flatten)]
    attribution: Attribution,
}

impl TrackedEvent {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn offer(&self) -> &str {
        &self.offer
    }

    pub fn merchant(&self) -> &str {
        &self.merchant
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn page_path(&self) -> &str {
        &self.page_path
    }

    pub fn link_url(&self) -> &str {
        &self.link_url
    }

    pub fn out_url_domain(&self) -> &str {
        &self.out_url_domain
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    /// Wire body for the first-party collector
    pub fn to_json(&self) -> String {
        // Every field is a string or string map; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Build a [`TrackedEvent`]. No I/O; the only non-derived inputs are `id`
/// and `now`.
pub fn compose(
    link: &ClassifiedLink,
    id: EventId,
    attribution: &Attribution,
    page: &PageContext,
    event_name: &str,
    now: DateTime<Utc>,
) -> TrackedEvent {
    let offer = if link.offer.is_empty() {
        link.text.clone()
    } else {
        link.offer.clone()
    };

    let merged = attribution.without(RESERVED_FIELDS);
    if merged.len() != attribution.len() {
        debug!(
            dropped = attribution.len() - merged.len(),
            "attribution keys shadowing event fields were dropped"
        );
    }

    TrackedEvent {
        event_id: id,
        event_name: event_name.to_string(),
        offer,
        merchant: link.merchant.clone(),
        position: link.position.clone(),
        price: link.price.clone(),
        action: link.action.clone(),
        page_path: page.path().to_string(),
        link_url: link.resolved_url.clone(),
        out_url_domain: link.out_url_domain.clone(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        user_agent: page.user_agent().map(str::to_string),
        attribution: merged,
    }
}
