use crate::metrics;
use crate::pricing::aggregator::{Aggregator, CollectorSummary};
use crate::pricing::record::CacheSnapshot;
use crate::pricing::store::{write_snapshot, CacheStore};
use crate::signals::ShutdownSignal;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Refreshing,
}

/// Answer to an on-demand refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    #[serde(rename = "already_in_progress")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// The merged result became the current snapshot
    Published,
    /// Every collector came back empty; the previous snapshot was kept
    SkippedEmpty,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Published => "published",
            RefreshOutcome::SkippedEmpty => "skipped_empty",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RefreshOutcome,
    pub records: usize,
    pub failed: usize,
    pub persisted: bool,
    pub collectors: Vec<CollectorSummary>,
}

#[derive(Debug, Error)]
#[error("a pricing refresh is already in progress")]
pub struct RefreshInProgress;

/// Busy flag held for the duration of one refresh cycle
///
/// Clears the flag on drop, including when the cycle unwinds.
struct RefreshGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Drives refresh cycles from a fixed interval and from manual triggers
///
/// Both paths go through the same busy flag, so at most one cycle runs at
/// a time. A trigger that finds a cycle running is refused rather than queued.
pub struct RefreshScheduler {
    aggregator: Arc<Aggregator>,
    store: Arc<CacheStore>,
    interval: Duration,
    running: Arc<AtomicBool>,
    last_report: ArcSwapOption<RefreshReport>,
}

impl RefreshScheduler {
    pub fn new(aggregator: Arc<Aggregator>, store: Arc<CacheStore>, interval: Duration) -> Self {
        Self {
            aggregator,
            store,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            last_report: ArcSwapOption::empty(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Refreshing
        } else {
            SchedulerState::Idle
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Report of the most recently completed cycle
    pub fn last_report(&self) -> Option<Arc<RefreshReport>> {
        self.last_report.load_full()
    }

    fn try_begin(&self) -> Option<RefreshGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                running: self.running.clone(),
            })
    }

    /// Run one refresh cycle to completion on the caller's task
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshInProgress> {
        let _guard = self.try_begin().ok_or(RefreshInProgress)?;
        Ok(self.run_cycle().await)
    }

    /// Start a refresh cycle in the background and return immediately
    pub fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        let Some(guard) = self.try_begin() else {
            debug!("Refresh requested while one is running");
            return TriggerOutcome::AlreadyRunning;
        };

        let scheduler = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            scheduler.run_cycle().await;
        });

        TriggerOutcome::Started
    }

    async fn run_cycle(&self) -> RefreshReport {
        info!("Starting pricing refresh");
        let aggregation = self.aggregator.run().await;
        let failed = aggregation.failed_collectors();
        let records = aggregation.records;

        let previous = self.store.get_snapshot();
        let mut persisted = false;

        let outcome = match previous {
            Some(previous) if records.is_empty() => {
                warn!(
                    "Refresh produced no records; keeping previous snapshot of {} records",
                    previous.size()
                );
                RefreshOutcome::SkippedEmpty
            }
            _ => {
                // Persistence is best effort; memory is updated regardless
                if let Some(path) = self.store.data_path() {
                    match write_snapshot(path, &records).await {
                        Ok(()) => persisted = true,
                        Err(e) => error!("Failed to persist pricing snapshot: {}", e),
                    }
                }

                let snapshot = self
                    .store
                    .publish(CacheSnapshot::new(records, aggregation.finished_at));
                metrics::set_cache_size(snapshot.size());
                RefreshOutcome::Published
            }
        };

        let finished_at = Utc::now();
        let elapsed = (finished_at - aggregation.started_at)
            .to_std()
            .unwrap_or_default();
        metrics::record_refresh(outcome.as_str(), elapsed);

        let report = RefreshReport {
            started_at: aggregation.started_at,
            finished_at,
            outcome,
            records: self.store.get_snapshot().map(|s| s.size()).unwrap_or(0),
            failed,
            persisted,
            collectors: aggregation.collectors,
        };

        info!(
            "Pricing refresh finished in {:?}: {} ({} records, {} collectors failed)",
            elapsed,
            outcome.as_str(),
            report.records,
            failed
        );

        self.last_report.store(Some(Arc::new(report.clone())));
        report
    }

    /// Run the periodic refresh loop until shutdown
    ///
    /// With `refresh_now` the first cycle starts immediately, otherwise
    /// after one full interval.
    pub fn spawn(
        self: Arc<Self>,
        refresh_now: bool,
        mut shutdown: broadcast::Receiver<ShutdownSignal>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Starting pricing refresh scheduler (interval: {:?})",
                self.interval
            );

            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            if !refresh_now {
                // First tick of a tokio interval completes immediately
                timer.tick().await;
            }

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = self.refresh().await {
                            debug!("Skipping scheduled refresh: {}", e);
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Pricing refresh scheduler stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::collector::{CollectorError, PriceCollector};
    use crate::pricing::record::{PricingMap, PricingRecord, ServiceType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Returns records until switched off, then fails
    struct Toggle {
        healthy: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceCollector for Toggle {
        fn name(&self) -> &str {
            "toggle"
        }

        async fn fetch(&self) -> Result<PricingMap, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(CollectorError::Status {
                    status: 503,
                    url: "https://example.test".to_string(),
                });
            }
            let mut map = PricingMap::new();
            map.insert(
                "toggle/a".to_string(),
                PricingRecord::new("toggle/a", "toggle", "t", ServiceType::ApiEndpoint, json!({})),
            );
            Ok(map)
        }
    }

    /// Blocks inside fetch until released
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PriceCollector for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn fetch(&self) -> Result<PricingMap, CollectorError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(PricingMap::new())
        }
    }

    fn scheduler_with(
        collector: Arc<dyn PriceCollector>,
        store: Arc<CacheStore>,
    ) -> Arc<RefreshScheduler> {
        let aggregator = Arc::new(Aggregator::new(vec![collector], Duration::from_secs(5)));
        Arc::new(RefreshScheduler::new(aggregator, store, Duration::from_secs(3600)))
    }

    #[tokio::test]
    async fn test_refresh_publishes_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model_pricing.json");
        let store = Arc::new(CacheStore::with_persistence(&path));
        let toggle = Arc::new(Toggle {
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(toggle, store.clone());

        let report = scheduler.refresh().await.unwrap();

        assert_eq!(report.outcome, RefreshOutcome::Published);
        assert!(report.persisted);
        assert_eq!(store.get_snapshot().unwrap().size(), 1);
        assert!(path.exists());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.last_report().is_some());
    }

    #[tokio::test]
    async fn test_empty_refresh_keeps_previous_snapshot() {
        let store = Arc::new(CacheStore::new());
        let toggle = Arc::new(Toggle {
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(toggle.clone(), store.clone());

        scheduler.refresh().await.unwrap();
        let before = store.get_snapshot().unwrap();

        toggle.healthy.store(false, Ordering::SeqCst);
        let report = scheduler.refresh().await.unwrap();

        assert_eq!(report.outcome, RefreshOutcome::SkippedEmpty);
        assert_eq!(report.failed, 1);
        let after = store.get_snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.size(), 1);
    }

    #[tokio::test]
    async fn test_empty_first_refresh_is_adopted() {
        let store = Arc::new(CacheStore::new());
        let toggle = Arc::new(Toggle {
            healthy: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(toggle, store.clone());

        let report = scheduler.refresh().await.unwrap();

        assert_eq!(report.outcome, RefreshOutcome::Published);
        assert!(store.is_ready());
        assert!(store.get_snapshot().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_while_refreshing_is_refused() {
        let store = Arc::new(CacheStore::new());
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let scheduler = scheduler_with(gate.clone(), store);

        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        gate.entered.notified().await;

        assert_eq!(scheduler.state(), SchedulerState::Refreshing);
        assert_eq!(scheduler.trigger(), TriggerOutcome::AlreadyRunning);
        assert!(scheduler.refresh().await.is_err());

        gate.release.notify_one();
        for _ in 0..100 {
            if scheduler.state() == SchedulerState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_spawned_loop_refreshes_immediately_and_stops_on_shutdown() {
        let store = Arc::new(CacheStore::new());
        let toggle = Arc::new(Toggle {
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(toggle.clone(), store.clone());
        let (tx, rx) = broadcast::channel(1);

        let handle = scheduler.spawn(true, rx);
        for _ in 0..100 {
            if store.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.is_ready());

        tx.send(ShutdownSignal::Graceful).unwrap();
        handle.await.unwrap();
        assert_eq!(toggle.calls.load(Ordering::SeqCst), 1);
    }
}
