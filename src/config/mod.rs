use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the navigation grace delay. Longer delays are clamped.
pub const MAX_NAVIGATION_GRACE_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub collector_server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub event_name: String,
    pub primary: PrimaryCollectorConfig,
    pub navigation: NavigationConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryCollectorConfig {
    pub enabled: bool,
    /// Absolute URL, or a path resolved against the page URL at dispatch time
    pub endpoint: String,
    #[serde(default = "PrimaryCollectorConfig::default_queue_size")]
    pub beacon_queue_size: usize,
    #[serde(default = "PrimaryCollectorConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMode {
    Deferred,
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    pub mode: NavigationMode,
    pub grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the `data-*` marker, without the `data-` prefix
    pub affiliate_marker: String,
    pub redirect_segment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "ServerConfig::default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
}

impl PrimaryCollectorConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "/api/track";

    const fn default_queue_size() -> usize {
        1024
    }

    const fn default_request_timeout_secs() -> u64 {
        10
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl NavigationConfig {
    /// Fixed delay before a deferred navigation is opened.
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms.min(MAX_NAVIGATION_GRACE_MS))
    }
}

impl ServerConfig {
    const fn default_dedup_ttl_secs() -> u64 {
        3600
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            event_name: "outbound_click".to_string(),
            primary: PrimaryCollectorConfig {
                enabled: true,
                endpoint: PrimaryCollectorConfig::DEFAULT_ENDPOINT.to_string(),
                beacon_queue_size: PrimaryCollectorConfig::default_queue_size(),
                request_timeout_secs: PrimaryCollectorConfig::default_request_timeout_secs(),
            },
            navigation: NavigationConfig {
                mode: NavigationMode::Deferred,
                grace_ms: 100,
            },
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            affiliate_marker: "aff".to_string(),
            redirect_segment: "go".to_string(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// Numeric env var; unset keeps `default`, an unparsable value is logged and
/// also falls back to `default`.
fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {name} '{raw}', falling back to {default}");
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = TrackerConfig::default();

        let endpoint = std::env::var("CLICKTRAIL_COLLECTOR_URL")
            .or_else(|_| std::env::var("KEITARO_ENDPOINT"))
            .unwrap_or_else(|_| PrimaryCollectorConfig::DEFAULT_ENDPOINT.to_string());
        let collector_enabled = env_flag("CLICKTRAIL_COLLECTOR_ENABLED", true);

        let beacon_queue_size = match env_number(
            "CLICKTRAIL_BEACON_QUEUE_SIZE",
            PrimaryCollectorConfig::default_queue_size(),
        ) {
            0 => PrimaryCollectorConfig::default_queue_size(),
            size => size,
        };
        let request_timeout_secs = env_number(
            "CLICKTRAIL_REQUEST_TIMEOUT_SECS",
            PrimaryCollectorConfig::default_request_timeout_secs(),
        );

        let event_name = std::env::var("CLICKTRAIL_EVENT_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.event_name);

        let mode = std::env::var("CLICKTRAIL_NAVIGATION_MODE")
            .unwrap_or_else(|_| "deferred".to_string())
            .to_lowercase();
        let mode = match mode.as_str() {
            "deferred" => NavigationMode::Deferred,
            "passthrough" => NavigationMode::Passthrough,
            other => {
                tracing::warn!(
                    "Unknown CLICKTRAIL_NAVIGATION_MODE '{other}', falling back to 'deferred'. Supported values: deferred, passthrough"
                );
                NavigationMode::Deferred
            }
        };

        let grace_ms = env_number("CLICKTRAIL_NAVIGATION_GRACE_MS", defaults.navigation.grace_ms);
        if grace_ms > MAX_NAVIGATION_GRACE_MS {
            tracing::warn!(
                "CLICKTRAIL_NAVIGATION_GRACE_MS={grace_ms} exceeds {MAX_NAVIGATION_GRACE_MS}ms, clamping"
            );
        }

        let affiliate_marker = std::env::var("CLICKTRAIL_AFFILIATE_MARKER")
            .map(|v| v.trim_start_matches("data-").to_string())
            .unwrap_or(defaults.classifier.affiliate_marker);
        let redirect_segment = std::env::var("CLICKTRAIL_REDIRECT_SEGMENT")
            .map(|v| v.trim_matches('/').to_string())
            .unwrap_or(defaults.classifier.redirect_segment);

        let collector_host =
            std::env::var("COLLECTOR_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let collector_port = env_number("COLLECTOR_PORT", 5000u16);
        let dedup_ttl_secs =
            env_number("COLLECTOR_DEDUP_TTL_SECS", ServerConfig::default_dedup_ttl_secs());

        Ok(Config {
            tracker: TrackerConfig {
                event_name,
                primary: PrimaryCollectorConfig {
                    enabled: collector_enabled,
                    endpoint,
                    beacon_queue_size,
                    request_timeout_secs,
                },
                navigation: NavigationConfig {
                    mode,
                    grace_ms: grace_ms.min(MAX_NAVIGATION_GRACE_MS),
                },
                classifier: ClassifierConfig {
                    affiliate_marker,
                    redirect_segment,
                },
            },
            collector_server: ServerConfig {
                host: collector_host,
                port: collector_port,
                dedup_ttl_secs,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_is_clamped() {
        let nav = NavigationConfig {
            mode: NavigationMode::Deferred,
            grace_ms: 5_000,
        };
        assert_eq!(nav.grace(), Duration::from_millis(MAX_NAVIGATION_GRACE_MS));
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        std::env::set_var("CLICKTRAIL_TEST_GRACE_MS", "soon");
        std::env::set_var("CLICKTRAIL_TEST_PORT", "70000");
        std::env::set_var("CLICKTRAIL_TEST_TTL_SECS", " 60 ");

        assert_eq!(env_number("CLICKTRAIL_TEST_GRACE_MS", 100u64), 100);
        assert_eq!(env_number("CLICKTRAIL_TEST_PORT", 5000u16), 5000);
        assert_eq!(env_number("CLICKTRAIL_TEST_TTL_SECS", 3600u64), 60);
        assert_eq!(env_number("CLICKTRAIL_TEST_UNSET", 7usize), 7);
    }

    #[test]
    fn test_defaults_match_conventions() {
        let tracker = TrackerConfig::default();
        assert_eq!(tracker.event_name, "outbound_click");
        assert_eq!(tracker.primary.endpoint, "/api/track");
        assert_eq!(tracker.navigation.grace(), Duration::from_millis(100));
        assert_eq!(tracker.classifier.affiliate_marker, "aff");
        assert_eq!(tracker.classifier.redirect_segment, "go");
    }
}
