use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::attribution::Attribution;
use super::classifier::LinkClassifier;
use super::dispatch::{DispatchReport, Dispatcher, PrimaryCollector};
use super::event::{compose, TrackedEvent};
use super::identity::{IdGenerator, RandomIdGenerator};
use super::navigation::{NavigationOutcome, NavigationPolicy, Navigator};
use super::tag::AnalyticsTag;
use super::transport::{BeaconQueue, HttpKeepalive};
use crate::config::TrackerConfig;
use crate::page::{ClickEvent, Document, PageContext};

/// Result of one click through the pipeline
#[derive(Debug)]
pub enum ClickOutcome {
    /// Not a trackable link; nothing was composed or sent
    Ignored,
    Tracked {
        event: TrackedEvent,
        report: DispatchReport,
        navigation: NavigationOutcome,
    },
}

impl ClickOutcome {
    pub fn event(&self) -> Option<&TrackedEvent> {
        match self {
            ClickOutcome::Ignored => None,
            ClickOutcome::Tracked { event, .. } => Some(event),
        }
    }

    /// Whether the host must cancel the click's default action
    pub fn prevents_default(&self) -> bool {
        match self {
            ClickOutcome::Ignored => false,
            ClickOutcome::Tracked { navigation, .. } => navigation.prevents_default(),
        }
    }
}

/// Single subscription point for page clicks.
///
/// `received -> classified -> (discarded | composed) -> dispatched`, run
/// synchronously per click with no state carried between clicks.
pub struct ClickListener {
    classifier: LinkClassifier,
    ids: Arc<dyn IdGenerator>,
    dispatcher: Dispatcher,
    navigation: NavigationPolicy,
    navigator: Arc<dyn Navigator>,
    event_name: String,
}

impl ClickListener {
    pub fn new(
        config: &TrackerConfig,
        dispatcher: Dispatcher,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            classifier: LinkClassifier::new(&config.classifier),
            ids: Arc::new(RandomIdGenerator),
            dispatcher,
            navigation: NavigationPolicy::new(&config.navigation),
            navigator,
            event_name: config.event_name.clone(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn grace(&self) -> Duration {
        self.navigation.grace()
    }

    pub fn handle_click(
        &self,
        document: &Document,
        click: &ClickEvent,
        page: &PageContext,
    ) -> ClickOutcome {
        let Some(link) = self.classifier.classify(document, click, page.url()) else {
            return ClickOutcome::Ignored;
        };

        let event = compose(
            &link,
            self.ids.generate(),
            &Attribution::from_url(page.url()),
            page,
            &self.event_name,
            Utc::now(),
        );
        debug!(
            event_id = %event.event_id(),
            offer = event.offer(),
            out_url_domain = event.out_url_domain(),
            "outbound click tracked"
        );

        let report = self.dispatcher.dispatch(&event, page.url());
        let navigation = self.navigation.apply(event.link_url(), &self.navigator);

        ClickOutcome::Tracked {
            event,
            report,
            navigation,
        }
    }
}

/// Production wiring from configuration: beacon queue with keep-alive
/// fallback for the primary collector, plus the given tags.
///
/// Must be called inside a tokio runtime. The returned queue should be shut
/// down before exit so queued beacons are delivered.
pub fn build_listener(
    config: &TrackerConfig,
    tags: Vec<Arc<dyn AnalyticsTag>>,
    navigator: Arc<dyn Navigator>,
) -> (ClickListener, Option<Arc<BeaconQueue>>) {
    let mut dispatcher = Dispatcher::new();
    let mut queue = None;

    if config.primary.enabled {
        let beacons = Arc::new(BeaconQueue::spawn(
            config.primary.beacon_queue_size,
            config.primary.request_timeout(),
        ));
        let fallback = Arc::new(HttpKeepalive::new(config.primary.request_timeout()));
        dispatcher = dispatcher.with_primary(
            PrimaryCollector::new(config.primary.endpoint.clone(), fallback)
                .with_beacon(beacons.clone()),
        );
        info!(endpoint = %config.primary.endpoint, "primary collector enabled");
        queue = Some(beacons);
    } else {
        info!("primary collector disabled");
    }

    for tag in tags {
        info!(tag = tag.name(), "analytics tag installed");
        dispatcher = dispatcher.with_tag(tag);
    }

    (ClickListener::new(config, dispatcher, navigator), queue)
}
