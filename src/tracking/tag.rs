//! Third-party analytics tag collectors
//!
//! Tags are optional capabilities handed to the dispatcher. A page without
//! a tag simply installs none.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

use super::attribution::DIRECT_CAMPAIGN;
use super::event::TrackedEvent;
use crate::error::TagError;

/// Event name pushed into a tag-manager data layer
pub const DATA_LAYER_EVENT: &str = "affiliate_click";

pub type TagParams = Map<String, Value>;

/// A synchronous analytics hook, invoked once per tracked event
pub trait AnalyticsTag: Send + Sync {
    fn name(&self) -> &str;

    fn record(&self, event: &TrackedEvent) -> Result<(), TagError>;
}

/// Parameter object for gtag-style hooks
pub fn tag_params(event: &TrackedEvent) -> TagParams {
    let mut params = Map::new();
    params.insert("offer".into(), json!(event.offer()));
    params.insert("action".into(), json!(event.action()));
    params.insert("event_name".into(), json!(event.event_name()));
    params.insert("page_path".into(), json!(event.page_path()));
    params.insert("event_id".into(), json!(event.event_id().to_string()));
    params.insert(
        "campaign".into(),
        json!(event.attribution().campaign().unwrap_or(DIRECT_CAMPAIGN)),
    );
    params
}

/// gtag-style hook: called as `hook(event_name, params)` with [`tag_params`].
///
/// The closure is the bridge into whatever tag the host embeds.
pub struct GtagHook<F> {
    name: String,
    hook: F,
}

impl<F> GtagHook<F>
where
    F: Fn(&str, &TagParams) -> Result<(), TagError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, hook: F) -> Self {
        Self {
            name: name.into(),
            hook,
        }
    }
}

impl<F> AnalyticsTag for GtagHook<F>
where
    F: Fn(&str, &TagParams) -> Result<(), TagError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, event: &TrackedEvent) -> Result<(), TagError> {
        (self.hook)(event.event_name(), &tag_params(event))
    }
}

/// In-memory tag-manager data layer.
///
/// Receives one flat object per click in the tag-manager shape
/// (`event`, merchant, offer, position, price, out_url_domain, link_url).
#[derive(Clone, Default)]
pub struct DataLayer {
    entries: Arc<Mutex<Vec<Value>>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: &TrackedEvent) -> Result<(), TagError> {
        let entry = json!({
            "event": DATA_LAYER_EVENT,
            "merchant": event.merchant(),
            "offer": event.offer(),
            "position": event.position(),
            "price": event.price(),
            "out_url_domain": event.out_url_domain(),
            "link_url": event.link_url(),
        });
        self.entries
            .lock()
            .map_err(|_| TagError::Unavailable("data layer lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AnalyticsTag for DataLayer {
    fn name(&self) -> &str {
        "dataLayer"
    }

    fn record(&self, event: &TrackedEvent) -> Result<(), TagError> {
        self.push(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageContext;
    use crate::tracking::attribution::Attribution;
    use crate::tracking::classifier::ClassifiedLink;
    use crate::tracking::event::compose;
    use crate::tracking::identity::generate_event_id;

    fn event(page_url: &str) -> TrackedEvent {
        let page = PageContext::parse(page_url).unwrap();
        let link = ClassifiedLink {
            offer: "pitch-black".to_string(),
            merchant: "Acme".to_string(),
            action: "check_price".to_string(),
            resolved_url: "https://site.example/go/pitch-black".to_string(),
            out_url_domain: "site.example".to_string(),
            ..Default::default()
        };
        compose(
            &link,
            generate_event_id(),
            &Attribution::from_url(page.url()),
            &page,
            "outbound_click",
            chrono::Utc::now(),
        )
    }

    #[test]
    fn test_params_default_campaign_to_direct() {
        let params = tag_params(&event("https://site.example/sleep/devices/"));
        assert_eq!(params["campaign"], "direct");
        assert_eq!(params["offer"], "pitch-black");
        assert_eq!(params["action"], "check_price");
        assert_eq!(params["page_path"], "/sleep/devices/");
    }

    #[test]
    fn test_params_carry_campaign() {
        let e = event("https://site.example/?utm_campaign=fall");
        let params = tag_params(&e);
        assert_eq!(params["campaign"], "fall");
        assert_eq!(params["event_id"], e.event_id().to_string());
    }

    #[test]
    fn test_gtag_hook_receives_event_name_and_params() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook = GtagHook::new("gtag", move |name: &str, params: &TagParams| {
            sink.lock().unwrap().push((name.to_string(), params.clone()));
            Ok(())
        });

        let e = event("https://site.example/");
        hook.record(&e).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "outbound_click");
        assert_eq!(seen[0].1, tag_params(&e));
    }

    #[test]
    fn test_data_layer_records_tag_manager_shape() {
        let layer = DataLayer::new();
        layer.record(&event("https://site.example/")).unwrap();
        let entries = layer.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["event"], DATA_LAYER_EVENT);
        assert_eq!(entries[0]["merchant"], "Acme");
        assert_eq!(entries[0]["out_url_domain"], "site.example");
        assert_eq!(entries[0]["position"], "");
    }
}
