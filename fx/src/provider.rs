//! The rate source capability and a mock implementation for tests.

use async_trait::async_trait;
use coinrate_common::RateRecord;

use crate::error::FxResult;

/// One upstream source of price data.
///
/// An implementation performs a single attempt per call and never retries;
/// failover is the cascade's job.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Attempt to fetch the current rate.
    async fn fetch(&self) -> FxResult<RateRecord>;
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    price: parking_lot::Mutex<Option<rust_decimal::Decimal>>,
    delay: parking_lot::Mutex<Option<std::time::Duration>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a source that answers with `price`.
    pub fn new(name: impl Into<String>, price: rust_decimal::Decimal) -> Self {
        Self {
            name: name.into(),
            price: parking_lot::Mutex::new(Some(price)),
            delay: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a source that always fails.
    pub fn failing(name: impl Into<String>) -> Self {
        let source = Self::new(name, rust_decimal::Decimal::ONE);
        source.fail();
        source
    }

    /// Answer subsequent calls with `price`.
    pub fn set_price(&self, price: rust_decimal::Decimal) {
        *self.price.lock() = Some(price);
    }

    /// Fail subsequent calls.
    pub fn fail(&self) {
        *self.price.lock() = None;
    }

    /// Delay every answer by `delay`.
    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Number of fetch attempts made against this source.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FxResult<RateRecord> {
        use crate::error::{FailureCause, FxError};

        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let price = *self.price.lock();
        match price {
            Some(price) => RateRecord::new(coinrate_common::CurrencyPair::btc_cad(), price, &self.name)
                .and_then(RateRecord::with_derived_range)
                .map_err(|e| FxError::provider(&self.name, FailureCause::InvalidPrice(e.to_string()))),
            None => Err(FxError::provider(
                &self.name,
                FailureCause::Network("mock failure".to_string()),
            )),
        }
    }
}
