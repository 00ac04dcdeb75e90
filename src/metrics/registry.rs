//! Metric Registry
//!
//! Owns the exporter's gauges inside a private `prometheus::Registry`.
//!
//! Writers apply a whole batch of samples under one write lock and readers
//! gather under the read lock, so a scrape never observes half of a cycle.
//! The lock is only held for in-memory work; nothing awaits while holding it.

use std::fmt;

use parking_lot::RwLock;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::domain::ports::UNKNOWN_LABEL;
use crate::error::Result;
use crate::monitoring::HealthSnapshot;

const CLUSTER_GROUP_LABELS: &[&str] = &["cluster", "group"];
const CLUSTER_LABELS: &[&str] = &["cluster"];

const LAST_UPDATED_NAME: &str = "quota_last_updated_timestamp";
const HEALTH_STATUS_NAME: &str = "exporter_health_status";

// =============================================================================
// Metric Definitions
// =============================================================================

/// Every labeled gauge the exporter publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaMetric {
    /// used / sum × 100, two decimals
    GroupUseRatio,
    /// Quota capacity
    SizeAvailable,
    /// Quota consumption
    SizeUsed,
    /// Capacity minus consumption
    SizeFree,
    /// Server-reported cluster usage percentage
    ClusterUseRate,
}

impl QuotaMetric {
    pub const ALL: [QuotaMetric; 5] = [
        QuotaMetric::GroupUseRatio,
        QuotaMetric::SizeAvailable,
        QuotaMetric::SizeUsed,
        QuotaMetric::SizeFree,
        QuotaMetric::ClusterUseRate,
    ];

    /// Exposition name
    pub fn name(self) -> &'static str {
        match self {
            QuotaMetric::GroupUseRatio => "quota_group_use_ratio",
            QuotaMetric::SizeAvailable => "quota_size_available",
            QuotaMetric::SizeUsed => "quota_size_used",
            QuotaMetric::SizeFree => "quota_size_free",
            QuotaMetric::ClusterUseRate => "cluster_use_rate",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            QuotaMetric::GroupUseRatio => "Quota usage ratio per group in percent",
            QuotaMetric::SizeAvailable => "Available quota size",
            QuotaMetric::SizeUsed => "Used quota size",
            QuotaMetric::SizeFree => "Free quota size",
            QuotaMetric::ClusterUseRate => "Cluster use rate percentage",
        }
    }

    /// Label names, in the order label values are supplied
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            QuotaMetric::ClusterUseRate => CLUSTER_LABELS,
            _ => CLUSTER_GROUP_LABELS,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QuotaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single gauge update
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: QuotaMetric,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(metric: QuotaMetric, labels: Vec<String>, value: f64) -> Self {
        Self {
            metric,
            labels,
            value,
        }
    }

    /// Sample at the all-`"unknown"` label tuple
    pub fn unknown(metric: QuotaMetric, value: f64) -> Self {
        let labels = metric
            .label_names()
            .iter()
            .map(|_| UNKNOWN_LABEL.to_string())
            .collect();
        Self::new(metric, labels, value)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrency-safe store of the exporter's gauges
pub struct MetricRegistry {
    registry: Registry,
    gauges: Vec<GaugeVec>,
    last_updated: Gauge,
    health_status: Gauge,
    cycle_lock: RwLock<()>,
}

impl MetricRegistry {
    /// Create and register every gauge.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let mut gauges = Vec::with_capacity(QuotaMetric::ALL.len());
        for metric in QuotaMetric::ALL {
            let gauge = GaugeVec::new(Opts::new(metric.name(), metric.help()), metric.label_names())?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.push(gauge);
        }

        let last_updated = Gauge::with_opts(Opts::new(
            LAST_UPDATED_NAME,
            "Unix time of the last successful quota update",
        ))?;
        registry.register(Box::new(last_updated.clone()))?;

        let health_status = Gauge::with_opts(Opts::new(
            HEALTH_STATUS_NAME,
            "Exporter health status (1 = healthy, 0 = failed)",
        ))?;
        registry.register(Box::new(health_status.clone()))?;
        health_status.set(1.0);

        Ok(Self {
            registry,
            gauges,
            last_updated,
            health_status,
            cycle_lock: RwLock::new(()),
        })
    }

    fn gauge(&self, metric: QuotaMetric) -> &GaugeVec {
        &self.gauges[metric.index()]
    }

    /// Apply a batch of samples as one visible update.
    pub fn apply(&self, samples: &[Sample]) {
        let _guard = self.cycle_lock.write();
        for sample in samples {
            self.set_locked(sample);
        }
    }

    /// Force the all-`"unknown"` sample of every labeled metric to zero.
    ///
    /// Samples for real label tuples are left untouched.
    pub fn reset_to_unknown(&self) {
        let _guard = self.cycle_lock.write();
        for metric in QuotaMetric::ALL {
            self.set_locked(&Sample::unknown(metric, 0.0));
        }
    }

    /// Mirror a health snapshot into the health and last-update gauges.
    pub fn publish_health(&self, snapshot: &HealthSnapshot) {
        let _guard = self.cycle_lock.write();
        self.health_status
            .set(if snapshot.status.is_healthy() { 1.0 } else { 0.0 });
        self.last_updated
            .set(snapshot.last_updated.timestamp() as f64);
    }

    fn set_locked(&self, sample: &Sample) {
        let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        match self.gauge(sample.metric).get_metric_with_label_values(values.as_slice()) {
            Ok(gauge) => gauge.set(sample.value),
            Err(e) => warn!(metric = %sample.metric, error = %e, "Dropping malformed sample"),
        }
    }

    /// Snapshot every metric family.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let _guard = self.cycle_lock.read();
        self.registry.gather()
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let families = self.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(buffer)
    }

    /// Current value of one labeled sample, if it has ever been written.
    pub fn sample(&self, metric: QuotaMetric, labels: &[&str]) -> Option<f64> {
        let names = metric.label_names();
        if names.len() != labels.len() {
            return None;
        }

        self.gather()
            .iter()
            .filter(|family| family.get_name() == metric.name())
            .flat_map(|family| family.get_metric().iter())
            .find(|series| {
                let pairs = series.get_label();
                pairs.len() == names.len()
                    && names.iter().zip(labels).all(|(name, value)| {
                        pairs
                            .iter()
                            .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
                    })
            })
            .map(|series| series.get_gauge().value())
    }

    /// Value of the `exporter_health_status` gauge
    pub fn health_status_value(&self) -> f64 {
        let _guard = self.cycle_lock.read();
        self.health_status.get()
    }

    /// Value of the `quota_last_updated_timestamp` gauge
    pub fn last_updated_value(&self) -> f64 {
        let _guard = self.cycle_lock.read();
        self.last_updated.get()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &QuotaMetric::ALL.len())
            .finish()
    }
}
