//! Property-Based Tests for the Quota Transform
//!
//! # Test Properties
//!
//! 1. **Ratio Formula**: published ratio == round(used / sum × 100, 2)
//! 2. **Range**: ratio stays within [0, 100] whenever used ≤ sum
//! 3. **Skip Rule**: zero-capacity records never produce samples
//! 4. **Label Normalization**: empty groups publish as "unknown"

#![cfg(test)]

use proptest::prelude::*;

use super::registry::QuotaMetric;
use super::transform::samples_for;
use crate::domain::ports::QuotaRecord;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for a record whose usage never exceeds capacity.
fn bounded_record_strategy() -> impl Strategy<Value = QuotaRecord> {
    (1u64..=u32::MAX as u64, any::<u32>(), "[a-z]{1,8}", proptest::option::of("[a-z0-9]{0,8}"))
        .prop_map(|(sum, seed, cluster, group)| QuotaRecord {
            cluster,
            group,
            date: None,
            size_used: seed as u64 % (sum + 1),
            size_sum: sum,
            use_rate: None,
        })
}

/// Strategy for arbitrary (possibly overcommitted or zero-capacity) records.
fn any_record_strategy() -> impl Strategy<Value = QuotaRecord> {
    (0u64..=1_000_000, 0u64..=1_000_000, "[a-z]{1,8}").prop_map(|(used, sum, cluster)| {
        QuotaRecord {
            cluster,
            group: Some("g".to_string()),
            date: None,
            size_used: used,
            size_sum: sum,
            use_rate: None,
        }
    })
}

fn ratio_of(record: &QuotaRecord) -> Option<f64> {
    let (samples, _) = samples_for(std::slice::from_ref(record));
    samples
        .iter()
        .find(|s| s.metric == QuotaMetric::GroupUseRatio)
        .map(|s| s.value)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_ratio_matches_formula(record in any_record_strategy()) {
        let published = ratio_of(&record);
        if record.size_sum == 0 {
            prop_assert!(published.is_none());
        } else {
            let expected = (record.size_used as f64 / record.size_sum as f64 * 100.0 * 100.0).round() / 100.0;
            prop_assert_eq!(published, Some(expected));
        }
    }

    #[test]
    fn prop_ratio_in_range_when_bounded(record in bounded_record_strategy()) {
        let ratio = ratio_of(&record).unwrap();
        prop_assert!((0.0..=100.0).contains(&ratio), "ratio {} out of range", ratio);
    }

    #[test]
    fn prop_zero_sum_never_published(used in any::<u64>(), cluster in "[a-z]{1,8}") {
        let record = QuotaRecord {
            cluster,
            group: None,
            date: None,
            size_used: used,
            size_sum: 0,
            use_rate: Some("50%".to_string()),
        };
        let (samples, summary) = samples_for(&[record]);
        prop_assert!(samples.is_empty());
        prop_assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn prop_group_label_never_empty(record in bounded_record_strategy()) {
        let (samples, _) = samples_for(std::slice::from_ref(&record));
        for sample in samples.iter().filter(|s| s.metric != QuotaMetric::ClusterUseRate) {
            prop_assert!(!sample.labels[1].is_empty());
            match record.group.as_deref() {
                Some(g) if !g.is_empty() => prop_assert_eq!(sample.labels[1].as_str(), g),
                _ => prop_assert_eq!(sample.labels[1].as_str(), "unknown"),
            }
        }
    }
}
