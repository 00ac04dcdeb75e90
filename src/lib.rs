//! Quota Exporter
//!
//! Polls a quota-accounting API on a fixed cadence, turns usage records into
//! Prometheus gauges, and tracks exporter health for a health-check endpoint.
//!
//! # Architecture
//!
//! ```text
//! QuotaApiClient (fetch) → transform (ratios) → MetricRegistry / HealthState
//!                                                       ↑
//!                                      /metrics and /health readers
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - HTTP quota API client implementing the domain port
//! - [`config`] - YAML configuration with defaults
//! - [`controller`] - The collection loop
//! - [`domain`] - Quota records and the source port
//! - [`error`] - Error types
//! - [`metrics`] - Gauge registry and record transform
//! - [`monitoring`] - Health state and exposition server

pub mod adapters;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod monitoring;

// Re-export commonly used types
pub use adapters::QuotaApiClient;
pub use config::{CollectorConfig, Config, ServerConfig};
pub use controller::QuotaCollector;
pub use domain::{QuotaRecord, QuotaSource};
pub use error::{Error, FetchError, Result};
pub use metrics::{MetricRegistry, QuotaMetric};
pub use monitoring::{AppState, HealthState, HealthStatus};
