//! Metrics module
//!
//! Owns the published gauges and the transform from quota records to
//! samples.

pub mod registry;
pub mod transform;

mod proptest;

pub use registry::{MetricRegistry, QuotaMetric, Sample};
pub use transform::{apply, parse_percentage, reset_to_failure_state, TransformSummary};
