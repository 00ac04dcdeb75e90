//! Domain Ports (Port/Adapter Pattern)
//!
//! The collector depends only on the [`QuotaSource`] port. The HTTP quota API
//! client in [`crate::adapters`] is the production implementation; tests plug
//! in scripted sources.
//!
//! ```text
//!   QuotaCollector ──▶ QuotaSource (port) ◀── QuotaApiClient (adapter)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;

/// Label used in place of an empty or absent name.
pub const UNKNOWN_LABEL: &str = "unknown";

// =============================================================================
// Value Objects
// =============================================================================

/// One usage entry reported by the quota API.
///
/// The API does not guarantee unique (cluster, group) pairs; later entries
/// simply overwrite earlier ones when published. Absent or null scalar fields
/// decode as zero or empty, so a null `size_sum` lands in the zero-capacity
/// skip instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Storage cluster the quota belongs to
    #[serde(rename = "clu_name", default, deserialize_with = "null_as_default")]
    pub cluster: String,

    /// Owning group, frequently empty
    #[serde(rename = "group_name", default)]
    pub group: Option<String>,

    /// Report date, display-only
    #[serde(default)]
    pub date: Option<String>,

    /// Consumed size
    #[serde(default, deserialize_with = "null_as_default")]
    pub size_used: u64,

    /// Capacity
    #[serde(default, deserialize_with = "null_as_default")]
    pub size_sum: u64,

    /// Server-computed cluster usage, e.g. `"42.50%"`
    #[serde(default)]
    pub use_rate: Option<String>,
}

impl QuotaRecord {
    /// Group label with empty names normalized to `"unknown"`.
    pub fn group_label(&self) -> &str {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => group,
            _ => UNKNOWN_LABEL,
        }
    }

    /// Usage ratio in percent rounded to two decimals.
    ///
    /// `None` when the capacity is zero. Values above 100 are passed through.
    pub fn use_ratio(&self) -> Option<f64> {
        if self.size_sum == 0 {
            return None;
        }
        let ratio = self.size_used as f64 / self.size_sum as f64 * 100.0;
        Some(round_to_hundredths(ratio))
    }

    /// Remaining capacity; negative when the quota is overcommitted.
    pub fn size_free(&self) -> f64 {
        self.size_sum as f64 - self.size_used as f64
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Round half away from zero to two decimal places.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Quota Source Port
// =============================================================================

/// Port for retrieving quota records.
///
/// An implementation performs exactly one attempt per call and must give up
/// with [`FetchError::Timeout`] once `deadline` has elapsed.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Fetch the current set of quota records.
    async fn fetch(&self, deadline: Duration) -> Result<Vec<QuotaRecord>, FetchError>;

    /// Human-readable description of where records come from.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(used: u64, sum: u64, group: Option<&str>) -> QuotaRecord {
        QuotaRecord {
            cluster: "cluA".to_string(),
            group: group.map(str::to_string),
            date: Some("2025-01-01".to_string()),
            size_used: used,
            size_sum: sum,
            use_rate: None,
        }
    }

    #[test]
    fn test_group_label_normalization() {
        assert_eq!(record(1, 2, Some("g1")).group_label(), "g1");
        assert_eq!(record(1, 2, Some("")).group_label(), "unknown");
        assert_eq!(record(1, 2, None).group_label(), "unknown");
    }

    #[test]
    fn test_use_ratio() {
        assert_eq!(record(500, 1000, None).use_ratio(), Some(50.0));
        assert_eq!(record(30, 120, None).use_ratio(), Some(25.0));
        assert_eq!(record(1, 3, None).use_ratio(), Some(33.33));
        assert_eq!(record(2, 3, None).use_ratio(), Some(66.67));
        assert_eq!(record(0, 10, None).use_ratio(), Some(0.0));
    }

    #[test]
    fn test_use_ratio_zero_capacity() {
        assert_eq!(record(10, 0, None).use_ratio(), None);
        assert_eq!(record(0, 0, None).use_ratio(), None);
    }

    #[test]
    fn test_use_ratio_not_clamped() {
        assert_eq!(record(300, 200, None).use_ratio(), Some(150.0));
        assert_eq!(record(300, 200, None).size_free(), -100.0);
    }

    #[test]
    fn test_record_deserialize() {
        let json = r#"{
            "size_used": 30,
            "clu_name": "cluB",
            "use_rate": "25.00%",
            "date": "2025-03-25",
            "size_sum": 120
        }"#;
        let rec: QuotaRecord = serde_json::from_str(json).unwrap();

        assert_eq!(rec.cluster, "cluB");
        assert_eq!(rec.group, None);
        assert_eq!(rec.group_label(), "unknown");
        assert_eq!(rec.use_rate.as_deref(), Some("25.00%"));
        assert_eq!(rec.size_used, 30);
        assert_eq!(rec.size_sum, 120);
    }

    #[test]
    fn test_record_rejects_negative_sizes() {
        let json = r#"{"size_used": -1, "clu_name": "c", "size_sum": 10}"#;
        assert!(serde_json::from_str::<QuotaRecord>(json).is_err());
    }

    #[test]
    fn test_record_null_and_missing_scalars_default() {
        let json = r#"{"size_used": null, "size_sum": 10, "clu_name": null}"#;
        let rec: QuotaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.cluster, "");
        assert_eq!(rec.size_used, 0);
        assert_eq!(rec.size_sum, 10);

        let rec: QuotaRecord = serde_json::from_str(r#"{"clu_name": "c"}"#).unwrap();
        assert_eq!(rec.size_used, 0);
        assert_eq!(rec.size_sum, 0);
        assert_eq!(rec.use_ratio(), None);
    }

    #[test]
    fn test_record_rejects_wrong_types() {
        let json = r#"{"size_used": "10", "clu_name": "c", "size_sum": 10}"#;
        assert!(serde_json::from_str::<QuotaRecord>(json).is_err());

        let json = r#"{"size_used": 1, "clu_name": 7, "size_sum": 10}"#;
        assert!(serde_json::from_str::<QuotaRecord>(json).is_err());
    }

    #[test]
    fn test_record_null_group() {
        let json = r#"{"size_used": 1, "clu_name": "c", "group_name": null, "size_sum": 10}"#;
        let rec: QuotaRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.group_label(), "unknown");
    }
}
