//! Coinrate FX
//!
//! Rate acquisition for the exchange: provider adapters, a priority-ordered
//! failover cascade, and the current-rate cache with its staleness and
//! override policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coinrate_fx::{adapters, HttpFetcher, RateCache, RateCascade};
//!
//! let http = HttpFetcher::new(std::time::Duration::from_secs(5))?;
//! let cascade = RateCascade::new(adapters::default_sources(http));
//! let cache = RateCache::new(Arc::new(cascade));
//!
//! let rate = cache.get_current_rate().await?;
//! ```

pub mod adapters;
pub mod cache;
pub mod cascade;
pub mod error;
pub mod provider;

pub use adapters::HttpFetcher;
pub use cache::{CacheSnapshot, RateCache, RateCacheConfig, RateState, SharedRateCache};
pub use cascade::{CascadeSnapshot, RateCascade};
pub use error::{FailureCause, FxError, FxResult};
pub use provider::RateSource;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
