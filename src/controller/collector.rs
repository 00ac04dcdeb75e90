//! Quota Collector
//!
//! Drives the fetch-transform-publish cycle. Cycles never overlap: the next
//! one starts `scrape_interval` after the previous one has fully finished,
//! so the effective period is fetch time plus interval.
//!
//! ```text
//!   ┌──────┐  tick   ┌─────────┐  done   ┌──────────────┐
//!   │ Idle │ ──────▶ │ Running │ ──────▶ │ sleep(interval) │──┐
//!   └──────┘         └─────────┘         └──────────────┘  │
//!       ▲                                                   │
//!       └───────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::CollectorConfig;
use crate::domain::ports::QuotaSource;
use crate::error::FetchError;
use crate::metrics::{transform, MetricRegistry, TransformSummary};
use crate::monitoring::{format_timestamp, HealthState};

/// Periodically fetches quota records and publishes them
pub struct QuotaCollector {
    source: Arc<dyn QuotaSource>,
    metrics: Arc<MetricRegistry>,
    health: Arc<HealthState>,
    scrape_interval: Duration,
    request_timeout: Duration,
}

impl QuotaCollector {
    pub fn new(
        config: &CollectorConfig,
        source: Arc<dyn QuotaSource>,
        metrics: Arc<MetricRegistry>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            source,
            metrics,
            health,
            scrape_interval: config.scrape_interval,
            request_timeout: config.request_timeout,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricRegistry> {
        &self.metrics
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. Cancellation is only observed
    /// between cycles; a running cycle always completes.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            source = %self.source.describe(),
            interval = ?self.scrape_interval,
            timeout = ?self.request_timeout,
            "Starting quota collector"
        );

        loop {
            // Outcome is already logged and published.
            let _ = self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.scrape_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Stopping quota collector");
                    break;
                }
            }
        }
    }

    /// Run one fetch-and-publish cycle to completion.
    ///
    /// On success all samples are applied before health flips to OK. On any
    /// failure the `"unknown"` series are zeroed and health flips to FAILED.
    pub async fn run_cycle(&self) -> Result<TransformSummary, FetchError> {
        let started = Utc::now();

        let fetched = match tokio::time::timeout(
            self.request_timeout,
            self.source.fetch(self.request_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.request_timeout)),
        };

        match fetched {
            Ok(records) => {
                let summary = transform::apply(&records, &self.metrics);
                self.health.record_success(Utc::now());
                self.metrics.publish_health(&self.health.snapshot());

                info!(
                    started_at = %format_timestamp(started),
                    entries = records.len(),
                    skipped = summary.skipped,
                    "Successfully fetched quota data"
                );
                Ok(summary)
            }
            Err(e) => {
                transform::reset_to_failure_state(&self.metrics);
                self.health.record_failure();
                self.metrics.publish_health(&self.health.snapshot());

                error!(
                    started_at = %format_timestamp(started),
                    kind = e.kind(),
                    "Quota collection failed: {}",
                    e
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for QuotaCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaCollector")
            .field("source", &self.source.describe())
            .field("scrape_interval", &self.scrape_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::QuotaRecord;
    use crate::metrics::QuotaMetric;
    use crate::monitoring::HealthStatus;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::DateTime;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    type Response = Result<Vec<QuotaRecord>, FetchError>;

    /// Replays canned responses, optionally holding each until released.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Response>>,
        delay: Duration,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Response>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl QuotaSource for ScriptedSource {
        async fn fetch(&self, _deadline: Duration) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let next = self.responses.lock().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Never answers.
    struct HangingSource;

    #[async_trait]
    impl QuotaSource for HangingSource {
        async fn fetch(&self, _deadline: Duration) -> Response {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "hanging".to_string()
        }
    }

    fn record(cluster: &str, group: &str, used: u64, sum: u64) -> QuotaRecord {
        QuotaRecord {
            cluster: cluster.to_string(),
            group: Some(group.to_string()),
            date: Some("2025-01-01".to_string()),
            size_used: used,
            size_sum: sum,
            use_rate: None,
        }
    }

    fn config(interval: Duration, timeout: Duration) -> CollectorConfig {
        CollectorConfig {
            api_url: "http://quota.test/api".to_string(),
            scrape_interval: interval,
            request_timeout: timeout,
        }
    }

    fn collector(source: Arc<dyn QuotaSource>, cfg: &CollectorConfig) -> QuotaCollector {
        QuotaCollector::new(
            cfg,
            source,
            Arc::new(MetricRegistry::new().unwrap()),
            Arc::new(HealthState::new()),
        )
    }

    fn default_collector(source: Arc<dyn QuotaSource>) -> QuotaCollector {
        collector(source, &config(Duration::from_secs(600), Duration::from_secs(180)))
    }

    #[tokio::test]
    async fn test_successful_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![record("cluA", "g1", 500, 1000)])]));
        let collector = default_collector(source);

        let before = Utc::now();
        let summary = collector.run_cycle().await.unwrap();

        assert_eq!(summary.published, 1);
        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluA", "g1"]),
            Some(50.0)
        );
        let snapshot = collector.health().snapshot();
        assert_eq!(snapshot.status, HealthStatus::Ok);
        assert!(snapshot.last_updated >= before - chrono::Duration::seconds(1));
        assert_eq!(collector.metrics().health_status_value(), 1.0);
        assert_eq!(
            collector.metrics().last_updated_value(),
            snapshot.last_updated.timestamp() as f64
        );
    }

    #[tokio::test]
    async fn test_empty_success_is_still_success() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![record("cluA", "g1", 10, 0)])]));
        let collector = default_collector(source);

        let summary = collector.run_cycle().await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluA", "g1"]),
            None
        );
        assert_eq!(collector.health().status(), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_failed_cycle_resets_and_marks_failed() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FetchError::UnexpectedStatus(500))]));
        let collector = default_collector(source);

        assert_matches!(
            collector.run_cycle().await,
            Err(FetchError::UnexpectedStatus(500))
        );

        let snapshot = collector.health().snapshot();
        assert_eq!(snapshot.status, HealthStatus::Failed);
        assert_eq!(snapshot.last_updated, DateTime::<Utc>::UNIX_EPOCH);
        for metric in QuotaMetric::ALL {
            let unknown: Vec<&str> = metric.label_names().iter().map(|_| "unknown").collect();
            assert_eq!(collector.metrics().sample(metric, &unknown), Some(0.0));
        }
        assert_eq!(collector.metrics().health_status_value(), 0.0);
        assert_eq!(collector.metrics().last_updated_value(), 0.0);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_samples() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![record("cluA", "g1", 500, 1000)]),
            Err(FetchError::Semantic("1234".to_string())),
        ]));
        let collector = default_collector(source);

        collector.run_cycle().await.unwrap();
        collector.run_cycle().await.unwrap_err();

        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluA", "g1"]),
            Some(50.0)
        );
        assert_eq!(
            collector
                .metrics()
                .sample(QuotaMetric::GroupUseRatio, &["unknown", "unknown"]),
            Some(0.0)
        );
        assert_eq!(collector.health().status(), HealthStatus::Failed);
    }

    #[tokio::test]
    async fn test_recovery_after_failure() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Semantic("9999".to_string())),
            Ok(vec![record("cluA", "g1", 1, 4)]),
        ]));
        let collector = default_collector(source);

        collector.run_cycle().await.unwrap_err();
        collector.run_cycle().await.unwrap();

        assert_eq!(collector.health().status(), HealthStatus::Ok);
        assert!(collector.health().last_updated() > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let collector = collector(
            Arc::new(HangingSource),
            &config(Duration::from_secs(600), Duration::from_secs(3)),
        );

        assert_matches!(collector.run_cycle().await, Err(FetchError::Timeout(d)) if d == Duration::from_secs(3));
        assert_eq!(collector.health().status(), HealthStatus::Failed);
    }

    #[tokio::test]
    async fn test_readers_see_previous_cycle_while_fetch_in_flight() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource {
            responses: Mutex::new(
                vec![
                    Ok(vec![record("cluA", "g1", 500, 1000)]),
                    Ok(vec![record("cluA", "g1", 750, 1000)]),
                ]
                .into(),
            ),
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let collector = Arc::new(default_collector(source.clone()));

        gate.notify_one();
        collector.run_cycle().await.unwrap();
        let first = collector.health().snapshot();

        let running = {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move { collector.run_cycle().await })
        };

        // Wait until the second fetch is parked on the gate.
        while source.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluA", "g1"]),
            Some(50.0)
        );
        assert_eq!(collector.health().snapshot(), first);

        gate.notify_one();
        running.await.unwrap().unwrap();

        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluA", "g1"]),
            Some(75.0)
        );
        assert!(collector.health().last_updated() >= first.last_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_never_overlaps_cycles() {
        let source = Arc::new(ScriptedSource {
            delay: Duration::from_secs(5),
            ..Default::default()
        });
        let collector = Arc::new(collector(
            source.clone(),
            &config(Duration::from_secs(10), Duration::from_secs(60)),
        ));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(&collector).run(shutdown.clone()));

        // Cycles start at t=0, 15 and 30 (5s fetch + 10s sleep).
        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(collector.health().status(), HealthStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_failures() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::UnexpectedStatus(502)),
            Err(FetchError::Semantic("1234".to_string())),
            Ok(vec![record("cluB", "unknown", 30, 120)]),
        ]));
        let collector = Arc::new(collector(
            source.clone(),
            &config(Duration::from_secs(10), Duration::from_secs(60)),
        ));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(Arc::clone(&collector).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(collector.health().status(), HealthStatus::Ok);
        assert_eq!(
            collector.metrics().sample(QuotaMetric::GroupUseRatio, &["cluB", "unknown"]),
            Some(25.0)
        );
    }
}
