//! Quota Transformer
//!
//! Turns quota records into gauge samples and applies them to a
//! [`MetricRegistry`]. Records with zero capacity are skipped entirely.
//! Every published record also sets its cluster's `cluster_use_rate`; an
//! absent or unparseable `use_rate` publishes 0.

use tracing::{debug, warn};

use crate::domain::ports::QuotaRecord;
use crate::metrics::registry::{MetricRegistry, QuotaMetric, Sample};

/// Outcome counts for one `apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    /// Records that produced samples
    pub published: usize,
    /// Records skipped for zero capacity
    pub skipped: usize,
}

/// Build the samples for a batch of records, in record order.
pub fn samples_for(records: &[QuotaRecord]) -> (Vec<Sample>, TransformSummary) {
    let mut samples = Vec::with_capacity(records.len() * QuotaMetric::ALL.len());
    let mut summary = TransformSummary::default();

    for record in records {
        let Some(ratio) = record.use_ratio() else {
            debug!(cluster = %record.cluster, group = %record.group_label(), "Skipping record with zero size_sum");
            summary.skipped += 1;
            continue;
        };

        let group_labels = vec![record.cluster.clone(), record.group_label().to_string()];

        samples.push(Sample::new(QuotaMetric::GroupUseRatio, group_labels.clone(), ratio));
        samples.push(Sample::new(
            QuotaMetric::SizeAvailable,
            group_labels.clone(),
            record.size_sum as f64,
        ));
        samples.push(Sample::new(
            QuotaMetric::SizeUsed,
            group_labels.clone(),
            record.size_used as f64,
        ));
        samples.push(Sample::new(QuotaMetric::SizeFree, group_labels, record.size_free()));

        samples.push(Sample::new(
            QuotaMetric::ClusterUseRate,
            vec![record.cluster.clone()],
            cluster_use_rate(record),
        ));

        summary.published += 1;
    }

    (samples, summary)
}

fn cluster_use_rate(record: &QuotaRecord) -> f64 {
    let Some(raw) = record.use_rate.as_deref() else {
        return 0.0;
    };
    parse_percentage(raw).unwrap_or_else(|| {
        warn!(cluster = %record.cluster, use_rate = %raw, "Failed to parse use_rate");
        0.0
    })
}

/// Publish a successful cycle's records.
pub fn apply(records: &[QuotaRecord], registry: &MetricRegistry) -> TransformSummary {
    let (samples, summary) = samples_for(records);
    registry.apply(&samples);
    summary
}

/// Mark every metric's `"unknown"` series as zero after a failed cycle.
pub fn reset_to_failure_state(registry: &MetricRegistry) {
    registry.reset_to_unknown();
}

/// Parse a percentage string such as `"42.50%"` into `42.5`.
pub fn parse_percentage(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}
