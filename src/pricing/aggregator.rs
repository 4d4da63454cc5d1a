use crate::metrics;
use crate::pricing::collector::{collect, Collection, PriceCollector};
use crate::pricing::record::PricingMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-collector line of a refresh report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectorSummary {
    pub collector: String,
    pub records: usize,
    pub error: Option<String>,
}

/// Result of running every registered collector once
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub records: PricingMap,
    pub collectors: Vec<CollectorSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Aggregation {
    pub fn failed_collectors(&self) -> usize {
        self.collectors.iter().filter(|c| c.error.is_some()).count()
    }
}

/// Runs the registered collectors and merges their output
///
/// Registration order is the tie-break order: when two collectors emit the
/// same `model_id`, the one registered later wins, whether collectors run
/// concurrently or one after another.
pub struct Aggregator {
    collectors: Vec<Arc<dyn PriceCollector>>,
    timeout: Duration,
    concurrent: bool,
}

impl Aggregator {
    pub fn new(collectors: Vec<Arc<dyn PriceCollector>>, timeout: Duration) -> Self {
        Self {
            collectors,
            timeout,
            concurrent: true,
        }
    }

    /// Run collectors one at a time instead of fire-and-await-all
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run every collector once and merge the results
    ///
    /// Never fails: a collector that errors contributes zero records.
    pub async fn run(&self) -> Aggregation {
        let started_at = Utc::now();
        debug!("Running {} collectors", self.collectors.len());

        let collections: Vec<Collection> = if self.concurrent {
            // join_all keeps input order, so the merge below is still deterministic
            futures::future::join_all(
                self.collectors
                    .iter()
                    .map(|c| collect(c.clone(), self.timeout)),
            )
            .await
        } else {
            let mut out = Vec::with_capacity(self.collectors.len());
            for collector in &self.collectors {
                out.push(collect(collector.clone(), self.timeout).await);
            }
            out
        };

        let summaries: Vec<CollectorSummary> = collections
            .iter()
            .map(|c| CollectorSummary {
                collector: c.collector.clone(),
                records: c.records.len(),
                error: c.error.as_ref().map(|e| e.to_string()),
            })
            .collect();

        for summary in &summaries {
            metrics::record_collector(&summary.collector, summary.records, summary.error.is_some());
        }

        let finished_at = Utc::now();
        let records = merge(collections.into_iter().map(|c| c.records), finished_at);

        info!(
            "Aggregated {} records from {} collectors ({} failed)",
            records.len(),
            summaries.len(),
            summaries.iter().filter(|s| s.error.is_some()).count()
        );

        Aggregation {
            records,
            collectors: summaries,
            started_at,
            finished_at,
        }
    }
}

/// Merge partial mappings in iteration order
///
/// Later partials overwrite earlier ones on a colliding `model_id`. The map
/// key is authoritative for each record's `model_id`, and records without a
/// `last_updated` are stamped with `now`.
pub fn merge(partials: impl IntoIterator<Item = PricingMap>, now: DateTime<Utc>) -> PricingMap {
    let mut merged = PricingMap::new();

    for partial in partials {
        for (model_id, mut record) in partial {
            record.model_id.clone_from(&model_id);
            if record.last_updated.is_none() {
                record.last_updated = Some(now);
            }

            if let Some(previous) = merged.insert(model_id, record) {
                debug!(
                    "Duplicate model_id {} from {}, later collector wins",
                    previous.model_id, previous.api_identifier
                );
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::collector::CollectorError;
    use crate::pricing::record::{PricingRecord, ServiceType};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(id: &str, provider: &str, raw: serde_json::Value) -> PricingRecord {
        PricingRecord::new(id, provider, "https://example.test", ServiceType::ApiEndpoint, raw)
    }

    fn partial(entries: &[(&str, &str)]) -> PricingMap {
        entries
            .iter()
            .map(|(id, provider)| (id.to_string(), record(id, provider, json!({}))))
            .collect()
    }

    struct StaticCollector {
        name: &'static str,
        records: PricingMap,
        delay: Duration,
    }

    #[async_trait]
    impl PriceCollector for StaticCollector {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<PricingMap, CollectorError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.records.clone())
        }
    }

    struct FailingCollector;

    #[async_trait]
    impl PriceCollector for FailingCollector {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self) -> Result<PricingMap, CollectorError> {
            Err(CollectorError::Parse("no tables".to_string()))
        }
    }

    #[test]
    fn test_merge_later_partial_wins() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut first = PricingMap::new();
        first.insert("x".to_string(), record("x", "a", json!({"price": 1})));
        let mut second = PricingMap::new();
        second.insert("x".to_string(), record("x", "b", json!({"price": 2})));

        let merged = merge(vec![first, second], now);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["x"].raw, json!({"price": 2}));
        assert_eq!(merged["x"].api_identifier, "b");
    }

    #[test]
    fn test_merge_is_order_independent_without_collisions() {
        let now = Utc::now();
        let a = partial(&[("a/1", "a"), ("a/2", "a")]);
        let b = partial(&[("b/1", "b")]);
        let c = partial(&[("c/1", "c"), ("c/2", "c")]);

        let forward = merge(vec![a.clone(), b.clone(), c.clone()], now);
        let backward = merge(vec![c, b, a], now);

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 5);
    }

    #[test]
    fn test_merge_stamps_missing_timestamps_only() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let mut stamped = record("a/1", "a", json!({}));
        stamped.last_updated = Some(earlier);
        let mut map = PricingMap::new();
        map.insert("a/1".to_string(), stamped);
        map.insert("a/2".to_string(), record("a/2", "a", json!({})));

        let merged = merge(vec![map], now);

        assert_eq!(merged["a/1"].last_updated, Some(earlier));
        assert_eq!(merged["a/2"].last_updated, Some(now));
    }

    #[test]
    fn test_merge_key_is_authoritative_model_id() {
        let mut map = PricingMap::new();
        map.insert("openai/gpt-4".to_string(), record("", "openai", json!({})));

        let merged = merge(vec![map], Utc::now());
        assert_eq!(merged["openai/gpt-4"].model_id, "openai/gpt-4");
    }

    #[tokio::test]
    async fn test_concurrent_run_uses_registration_order_for_ties() {
        let mut first = PricingMap::new();
        first.insert("x".to_string(), record("x", "first", json!({"v": 1})));
        let mut second = PricingMap::new();
        second.insert("x".to_string(), record("x", "second", json!({"v": 2})));

        // The second collector finishes first; registration order must still decide
        let aggregator = Aggregator::new(
            vec![
                Arc::new(StaticCollector {
                    name: "first",
                    records: first,
                    delay: Duration::from_millis(50),
                }),
                Arc::new(StaticCollector {
                    name: "second",
                    records: second,
                    delay: Duration::from_millis(0),
                }),
            ],
            Duration::from_secs(1),
        );

        let aggregation = aggregator.run().await;
        assert_eq!(aggregation.records["x"].raw, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_failed_collector_contributes_nothing() {
        let aggregator = Aggregator::new(
            vec![
                Arc::new(StaticCollector {
                    name: "good",
                    records: partial(&[("good/1", "good"), ("good/2", "good")]),
                    delay: Duration::ZERO,
                }),
                Arc::new(FailingCollector),
            ],
            Duration::from_secs(1),
        )
        .with_concurrency(false);

        let aggregation = aggregator.run().await;

        assert_eq!(aggregation.records.len(), 2);
        assert_eq!(aggregation.failed_collectors(), 1);
        assert_eq!(aggregation.collectors[1].collector, "broken");
        assert_eq!(aggregation.collectors[1].records, 0);
        assert!(aggregation.collectors[1]
            .error
            .as_deref()
            .unwrap()
            .contains("no tables"));
    }
}
