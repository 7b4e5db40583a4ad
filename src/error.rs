use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid page url '{url}': {reason}")]
    InvalidPageUrl { url: String, reason: String },
    #[error("collector endpoint '{endpoint}' cannot be resolved against '{base}'")]
    UnresolvableEndpoint { endpoint: String, base: String },
    #[error("collector transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector responded with status {0}")]
    CollectorStatus(StatusCode),
    #[error("no async runtime available to carry the request")]
    NoRuntime,
}

/// Failure reported by an analytics tag hook. Always swallowed by the dispatcher.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("analytics tag unavailable: {0}")]
    Unavailable(String),
    #[error("analytics tag rejected event: {0}")]
    Rejected(String),
}

pub type TrackingResult<T> = Result<T, TrackingError>;
