//! Exporter Observability Surface
//!
//! Health tracking and the HTTP server that exposes metrics and health to
//! scrapers.
//!
//! ```text
//!   QuotaCollector ──writes──▶ MetricRegistry ◀──reads── /metrics
//!                  ──writes──▶ HealthState    ◀──reads── /health
//! ```

mod health;
mod server;

pub use health::{
    format_timestamp, HealthResponse, HealthSnapshot, HealthState, HealthStatus, TIMESTAMP_FORMAT,
};
pub use server::{route, run_server, serve, AppState};
