//! Priority-ordered failover across rate sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coinrate_common::{constants, RateRecord};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{FailureCause, FxError, FxResult};
use crate::provider::RateSource;

/// Tries each source in order and returns the first success.
///
/// No averaging and no deduplication: strict priority, first success wins.
/// Each attempt is bounded by `attempt_timeout`, so a full pass never takes
/// longer than `sources.len() * attempt_timeout`.
pub struct RateCascade {
    sources: Vec<Arc<dyn RateSource>>,
    attempt_timeout: Duration,
    stats: CascadeStats,
}

impl RateCascade {
    /// Create a cascade with the default per-source timeout.
    pub fn new(sources: Vec<Arc<dyn RateSource>>) -> Self {
        Self {
            sources,
            attempt_timeout: constants::provider_timeout(),
            stats: CascadeStats::default(),
        }
    }

    /// Override the per-source timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Names of the configured sources in priority order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run one pass over the sources.
    pub async fn acquire(&self) -> FxResult<RateRecord> {
        for (priority, source) in self.sources.iter().enumerate() {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            debug!(provider = source.name(), priority, "Attempting rate source");

            let outcome = match tokio::time::timeout(self.attempt_timeout, source.fetch()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FxError::provider(source.name(), FailureCause::Timeout)),
            };

            match outcome {
                Ok(mut record) => {
                    record.is_manual_override = false;
                    info!(
                        provider = source.name(),
                        price = %record.price,
                        "Rate acquired"
                    );
                    self.stats.record_success(source.name());
                    return Ok(record);
                }
                Err(e) => {
                    warn!(provider = source.name(), error = %e, "Rate source failed");
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        error!(attempted = self.sources.len(), "All rate sources failed");
        self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
        Err(FxError::AllProvidersUnavailable {
            attempts: self.sources.len(),
        })
    }

    /// Get a snapshot of attempt and outcome counters.
    pub fn stats(&self) -> CascadeSnapshot {
        self.stats.snapshot()
    }
}

#[async_trait]
impl RateSource for RateCascade {
    fn name(&self) -> &str {
        "CASCADE"
    }

    async fn fetch(&self) -> FxResult<RateRecord> {
        self.acquire().await
    }
}

/// Counters describing cascade outcomes.
#[derive(Default)]
struct CascadeStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    exhausted: AtomicU64,
    last_provider: Mutex<Option<String>>,
}

impl CascadeStats {
    fn record_success(&self, provider: &str) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        *self.last_provider.lock() = Some(provider.to_string());
    }

    fn snapshot(&self) -> CascadeSnapshot {
        CascadeSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            last_provider: self.last_provider.lock().clone(),
        }
    }
}

/// Point-in-time view of cascade counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSnapshot {
    /// Individual source attempts.
    pub attempts: u64,
    /// Passes that ended in a success.
    pub successes: u64,
    /// Individual source failures, timeouts included.
    pub failures: u64,
    /// Passes in which every source failed.
    pub exhausted: u64,
    /// Source that produced the most recent success.
    pub last_provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockRateSource;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Instant;

    #[tokio::test]
    async fn test_first_success_wins() {
        let p1 = Arc::new(MockRateSource::new("p1", dec!(50000)));
        let p2 = Arc::new(MockRateSource::new("p2", dec!(51000)));

        let cascade = RateCascade::new(vec![p1.clone(), p2.clone()]);
        let record = cascade.acquire().await.unwrap();

        assert_eq!(record.price, dec!(50000));
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[test]
    fn test_source_names_in_priority_order() {
        let cascade = RateCascade::new(vec![
            Arc::new(MockRateSource::failing("p1")),
            Arc::new(MockRateSource::new("p2", dec!(1))),
        ]);
        assert_eq!(cascade.source_names(), vec!["p1", "p2"]);

        let record = tokio_test::block_on(cascade.fetch()).unwrap();
        assert_eq!(record.source, "p2");
        assert_eq!(cascade.stats().last_provider.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_falls_through_to_third_source() {
        let p1 = Arc::new(MockRateSource::failing("p1"));
        let p2 = Arc::new(MockRateSource::failing("p2"));
        let p3 = Arc::new(MockRateSource::new("p3", dec!(60000)));

        let cascade = RateCascade::new(vec![p1.clone(), p2.clone(), p3.clone()]);
        let record = cascade.acquire().await.unwrap();

        assert_eq!(record.price, dec!(60000));
        assert_eq!(record.source, "p3");
        assert!(!record.is_manual_override);
        assert_eq!((p1.calls(), p2.calls(), p3.calls()), (1, 1, 1));

        let stats = cascade.stats();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.last_provider.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn test_out_of_range_price_falls_through() {
        let p1 = Arc::new(MockRateSource::new("p1", Decimal::MAX));
        let p2 = Arc::new(MockRateSource::new("p2", dec!(60000)));

        let cascade = RateCascade::new(vec![p1.clone(), p2.clone()]);
        let record = cascade.acquire().await.unwrap();

        assert_eq!(record.source, "p2");
        assert_eq!((p1.calls(), p2.calls()), (1, 1));
        assert_eq!(cascade.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_all_failed_is_a_value_not_a_panic() {
        let cascade = RateCascade::new(vec![
            Arc::new(MockRateSource::failing("p1")),
            Arc::new(MockRateSource::failing("p2")),
        ]);

        let result = cascade.acquire().await;

        assert_eq!(result, Err(FxError::AllProvidersUnavailable { attempts: 2 }));
        assert_eq!(cascade.stats().exhausted, 1);
    }

    #[tokio::test]
    async fn test_empty_cascade_reports_unavailable() {
        let cascade = RateCascade::new(Vec::new());
        assert_eq!(
            cascade.acquire().await,
            Err(FxError::AllProvidersUnavailable { attempts: 0 })
        );
    }

    #[tokio::test]
    async fn test_slow_source_times_out_and_next_is_tried() {
        let slow = Arc::new(
            MockRateSource::new("slow", dec!(1)).with_delay(Duration::from_secs(10)),
        );
        let fast = Arc::new(MockRateSource::new("fast", dec!(62000)));

        let cascade = RateCascade::new(vec![slow.clone(), fast])
            .with_attempt_timeout(Duration::from_millis(50));

        let started = Instant::now();
        let record = cascade.acquire().await.unwrap();

        assert_eq!(record.source, "fast");
        assert_eq!(slow.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cascade_is_itself_a_source() {
        let inner = RateCascade::new(vec![Arc::new(MockRateSource::new("p1", dec!(1.5)))]);
        let outer = RateCascade::new(vec![Arc::new(inner)]);

        let record = outer.fetch().await.unwrap();
        assert_eq!(record.price, dec!(1.5));
    }
}
