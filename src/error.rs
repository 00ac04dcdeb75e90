//! Error types for the Quota Exporter

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while starting or running the exporter
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration could not be decoded
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Metric registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(String),

    /// A quota fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Classified failure of a single quota fetch.
///
/// Every variant is terminal for the cycle that produced it; the collector
/// never retries within a cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be constructed (malformed endpoint)
    #[error("Failed to create request: {0}")]
    RequestBuild(#[source] reqwest::Error),

    /// Transport-level failure
    #[error("Failed to fetch quota data: {0}")]
    Network(#[source] reqwest::Error),

    /// The request deadline elapsed before a response was read
    #[error("Quota API request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP status other than 200
    #[error("Quota API returned status: {0}")]
    UnexpectedStatus(u16),

    /// Body is not a `{code, data}` envelope
    #[error("Failed to parse JSON: {0}")]
    Decode(#[source] serde_json::Error),

    /// Envelope decoded but carried a non-success code
    #[error("API returned unexpected code: {0}")]
    Semantic(String),
}

impl FetchError {
    /// Short classification used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RequestBuild(_) => "request_build",
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::UnexpectedStatus(_) => "unexpected_status",
            FetchError::Decode(_) => "decode",
            FetchError::Semantic(_) => "semantic",
        }
    }
}
