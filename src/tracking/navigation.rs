//! Navigation policy for tracked clicks
//!
//! Tracking never decides *whether* the user reaches the destination, only
//! whether the host's default action runs untouched or the destination is
//! opened by us after a fixed grace delay.

use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{NavigationConfig, NavigationMode};

/// How the destination is opened when navigation is deferred.
///
/// Always a new browsing context without an opener or referrer back to the
/// originating page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: String,
    pub new_context: bool,
    pub no_opener: bool,
    pub no_referrer: bool,
}

impl NavigationRequest {
    pub fn isolated(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            new_context: true,
            no_opener: true,
            no_referrer: true,
        }
    }

    /// Window features string in `window.open` form
    pub fn features(&self) -> String {
        let mut features = Vec::new();
        if self.no_opener {
            features.push("noopener");
        }
        if self.no_referrer {
            features.push("noreferrer");
        }
        features.join(",")
    }
}

/// Opens a destination on behalf of a deferred click
pub trait Navigator: Send + Sync {
    fn open(&self, request: NavigationRequest);
}

/// What the host should do with the click's default action
#[derive(Debug)]
pub enum NavigationOutcome {
    /// Let the default action run now
    Proceed,
    /// Default action is prevented; the destination opens after `delay`
    Deferred {
        delay: Duration,
        request: NavigationRequest,
        timer: Option<JoinHandle<()>>,
    },
}

impl NavigationOutcome {
    pub fn prevents_default(&self) -> bool {
        matches!(self, NavigationOutcome::Deferred { .. })
    }
}

#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    mode: NavigationMode,
    grace: Duration,
}

impl NavigationPolicy {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            mode: config.mode,
            grace: config.grace(),
        }
    }

    pub fn passthrough() -> Self {
        Self {
            mode: NavigationMode::Passthrough,
            grace: Duration::ZERO,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Apply the policy for a click on `destination`.
    ///
    /// The delay is the same for every click and does not depend on any
    /// collector. Only web destinations are deferred: an empty destination
    /// (unresolvable href) or a `javascript:`/`mailto:` style link keeps the
    /// host's own behaviour and is never opened by us.
    pub fn apply(&self, destination: &str, navigator: &Arc<dyn Navigator>) -> NavigationOutcome {
        if self.mode == NavigationMode::Passthrough {
            return NavigationOutcome::Proceed;
        }
        if !is_web_destination(destination) {
            debug!(destination, "not a web destination, leaving navigation to the host");
            return NavigationOutcome::Proceed;
        }

        let request = NavigationRequest::isolated(destination);
        let timer = match Handle::try_current() {
            Ok(runtime) => {
                let navigator = Arc::clone(navigator);
                let delayed = request.clone();
                let delay = self.grace;
                Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.open(delayed);
                }))
            }
            Err(_) => {
                debug!("no runtime for grace timer, opening destination immediately");
                navigator.open(request.clone());
                None
            }
        };

        NavigationOutcome::Deferred {
            delay: self.grace,
            request,
            timer,
        }
    }
}

fn is_web_destination(destination: &str) -> bool {
    Url::parse(destination)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<NavigationRequest>>);

    impl Navigator for RecordingNavigator {
        fn open(&self, request: NavigationRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    fn deferred(grace_ms: u64) -> NavigationPolicy {
        NavigationPolicy::new(&NavigationConfig {
            mode: NavigationMode::Deferred,
            grace_ms,
        })
    }

    #[test]
    fn test_isolated_request_features() {
        let request = NavigationRequest::isolated("https://merchant.example/x");
        assert!(request.new_context);
        assert_eq!(request.features(), "noopener,noreferrer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_opens_after_grace() {
        let recorder = Arc::new(RecordingNavigator::default());
        let navigator: Arc<dyn Navigator> = recorder.clone();

        let outcome = deferred(100).apply("https://merchant.example/x", &navigator);
        assert!(outcome.prevents_default());
        assert!(recorder.0.lock().unwrap().is_empty());

        let NavigationOutcome::Deferred { timer, delay, .. } = outcome else {
            panic!("expected deferred navigation");
        };
        assert_eq!(delay, Duration::from_millis(100));
        timer.unwrap().await.unwrap();

        let opened = recorder.0.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0], NavigationRequest::isolated("https://merchant.example/x"));
    }

    #[test]
    fn test_passthrough_and_empty_destination_proceed() {
        let recorder = Arc::new(RecordingNavigator::default());
        let navigator: Arc<dyn Navigator> = recorder.clone();

        assert!(!NavigationPolicy::passthrough()
            .apply("https://merchant.example/x", &navigator)
            .prevents_default());
        assert!(!deferred(100).apply("", &navigator).prevents_default());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_web_destinations_proceed() {
        let recorder = Arc::new(RecordingNavigator::default());
        let navigator: Arc<dyn Navigator> = recorder.clone();
        let policy = deferred(100);

        for destination in [
            "javascript:void(0",
            "mailto:deals@merchant.example",
            "tel:+15550100",
            "not a url",
        ] {
            let outcome = policy.apply(destination, &navigator);
            assert!(!outcome.prevents_default(), "{destination} was deferred");
        }
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_without_runtime_opens_immediately() {
        let recorder = Arc::new(RecordingNavigator::default());
        let navigator: Arc<dyn Navigator> = recorder.clone();

        let outcome = deferred(100).apply("https://merchant.example/x", &navigator);
        assert!(outcome.prevents_default());
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
