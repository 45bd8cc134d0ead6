//! Current-rate cache with staleness and override policy.
//!
//! ```text
//!   EMPTY --fetch ok--> FRESH --interval elapses--> STALE --fetch ok--> FRESH
//!     |                                               |
//!     +--fetch fails: stays EMPTY                     +--fetch fails: stale record served
//!
//!   any --set_override--> PINNED --clear_override (fetch ok)--> FRESH
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use coinrate_common::{constants, CurrencyPair, RateOverride, RateRecord};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult};
use crate::provider::RateSource;

/// Lifecycle state of the cached rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateState {
    /// No record yet.
    Empty,
    /// Live record younger than the refresh interval.
    Fresh,
    /// Live record at least as old as the refresh interval.
    Stale,
    /// Administrative override; never refreshed by age.
    Pinned,
}

/// Configuration for the rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Age at which a live record must be refetched.
    pub refresh_interval: Duration,
    /// When false, a stale record is served without refetching.
    pub auto_refresh: bool,
    /// Last-resort price served, flagged synthetic, when nothing is cached
    /// and every source fails. `None` surfaces the failure instead.
    pub fallback_price: Option<Decimal>,
    /// Pair used for override and fallback records.
    pub pair: CurrencyPair,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: constants::rate_refresh_interval(),
            auto_refresh: true,
            fallback_price: None,
            pair: CurrencyPair::btc_cad(),
        }
    }
}

/// Holds the process-wide current rate.
///
/// Readers never observe a partially written record: records are replaced
/// wholesale under the write lock. Refreshes are serialized through
/// `refresh_gate`, so concurrent readers of a stale or empty cache share a
/// single upstream fetch.
pub struct RateCache {
    source: Arc<dyn RateSource>,
    current: RwLock<Option<RateRecord>>,
    refresh_gate: tokio::sync::Mutex<()>,
    /// Bumped on every completed fetch attempt.
    generation: AtomicU64,
    last_failure: Mutex<Option<FxError>>,
    stats: CacheCounters,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create an empty cache in front of `source`.
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self::with_config(source, RateCacheConfig::default())
    }

    /// Create an empty cache with explicit refresh and fallback settings.
    pub fn with_config(source: Arc<dyn RateSource>, config: RateCacheConfig) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            stats: CacheCounters::default(),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &RateCacheConfig {
        &self.config
    }

    /// Current state of the cached record.
    pub fn state(&self) -> RateState {
        match self.current.read().as_ref() {
            None => RateState::Empty,
            Some(record) => self.classify(record),
        }
    }

    /// The cached record, without any refresh.
    pub fn peek(&self) -> Option<RateRecord> {
        self.current.read().clone()
    }

    /// Return the current rate, refreshing first when stale or empty.
    ///
    /// A failed refresh keeps serving the previous record. With nothing
    /// cached, the configured fallback is served if any, else the failure is
    /// returned.
    pub async fn get_current_rate(&self) -> FxResult<RateRecord> {
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(record) = self.servable() {
            return Ok(record);
        }

        let seen = self.generation.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;

        if let Some(record) = self.servable() {
            debug!("Refresh completed by a concurrent reader");
            return Ok(record);
        }
        if self.generation.load(Ordering::Acquire) != seen {
            // A refresh failed while we waited; do not hit upstream again.
            let err = self
                .last_failure
                .lock()
                .clone()
                .unwrap_or(FxError::AllProvidersUnavailable { attempts: 0 });
            return self.degrade(err);
        }

        debug!(state = ?self.state(), "Refreshing rate");
        match self.fetch_live().await {
            Ok(record) => Ok(self.store_live(record)),
            Err(err) => self.degrade(err),
        }
    }

    /// Pin an administrator-supplied rate.
    pub fn set_override(&self, request: &RateOverride) -> FxResult<RateRecord> {
        let record = RateRecord::manual(self.config.pair.clone(), request)
            .map_err(|e| FxError::InvalidRate(e.to_string()))?;

        *self.current.write() = Some(record.clone());
        info!(price = %record.price, "Rate override set");
        Ok(record)
    }

    /// Drop any override and fetch a live rate immediately.
    ///
    /// If every source fails the override stays in place and the failure is
    /// returned.
    pub async fn clear_override(&self) -> FxResult<RateRecord> {
        let _gate = self.refresh_gate.lock().await;

        let record = self.fetch_live().await?;
        *self.current.write() = Some(record.clone());
        info!(price = %record.price, source = %record.source, "Rate override cleared");
        Ok(record)
    }

    /// Get a snapshot of read and refresh counters.
    pub fn stats(&self) -> CacheSnapshot {
        CacheSnapshot {
            state: self.state(),
            reads: self.stats.reads.load(Ordering::Relaxed),
            refreshes: self.stats.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.stats.refresh_failures.load(Ordering::Relaxed),
            stale_served: self.stats.stale_served.load(Ordering::Relaxed),
            fallback_served: self.stats.fallback_served.load(Ordering::Relaxed),
        }
    }

    fn classify(&self, record: &RateRecord) -> RateState {
        if record.is_manual_override {
            RateState::Pinned
        } else if record.is_older_than(self.config.refresh_interval) {
            RateState::Stale
        } else {
            RateState::Fresh
        }
    }

    /// The cached record if it may be served without a fetch.
    fn servable(&self) -> Option<RateRecord> {
        let guard = self.current.read();
        let record = guard.as_ref()?;
        match self.classify(record) {
            RateState::Fresh | RateState::Pinned => Some(record.clone()),
            RateState::Stale if !self.config.auto_refresh => Some(record.clone()),
            _ => None,
        }
    }

    /// One pass over the source; records the outcome.
    async fn fetch_live(&self) -> FxResult<RateRecord> {
        let outcome = self.source.fetch().await;
        self.generation.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(mut record) => {
                record.is_manual_override = false;
                self.stats.refreshes.fetch_add(1, Ordering::Relaxed);
                *self.last_failure.lock() = None;
                Ok(record)
            }
            Err(err) => {
                self.stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
                *self.last_failure.lock() = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Store a fetched record unless an override landed during the fetch.
    fn store_live(&self, record: RateRecord) -> RateRecord {
        let mut current = self.current.write();
        if let Some(pinned) = current.as_ref().filter(|r| r.is_manual_override) {
            debug!("Override set during refresh; discarding fetched rate");
            return pinned.clone();
        }
        *current = Some(record.clone());
        record
    }

    fn degrade(&self, err: FxError) -> FxResult<RateRecord> {
        if let Some(previous) = self.peek() {
            self.stats.stale_served.fetch_add(1, Ordering::Relaxed);
            warn!(
                error = %err,
                age_secs = previous.age().num_seconds(),
                "Refresh failed; serving previous rate"
            );
            return Ok(previous);
        }

        match self.config.fallback_price {
            Some(price) => {
                let record = RateRecord::fallback(self.config.pair.clone(), price)
                    .map_err(|e| FxError::InvalidRate(e.to_string()))?;
                self.stats.fallback_served.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, price = %price, "No rate available; serving synthetic fallback");
                Ok(record)
            }
            None => Err(err),
        }
    }
}

#[derive(Default)]
struct CacheCounters {
    reads: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    stale_served: AtomicU64,
    fallback_served: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub state: RateState,
    pub reads: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
    pub stale_served: u64,
    pub fallback_served: u64,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;
