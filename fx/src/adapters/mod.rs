//! Concrete upstream price sources.
//!
//! Each adapter owns its endpoint and its payload-to-record mapping. The
//! mapping is exposed as a pure `parse` function so it can be exercised
//! without a network.

pub mod coindesk;
pub mod coingecko;
pub mod cryptocompare;
pub mod http;

use std::sync::Arc;

pub use coindesk::CoinDeskSource;
pub use coingecko::CoinGeckoSource;
pub use cryptocompare::CryptoCompareSource;
pub use http::HttpFetcher;

use crate::provider::RateSource;

/// The production sources in priority order.
pub fn default_sources(http: HttpFetcher) -> Vec<Arc<dyn RateSource>> {
    vec![
        Arc::new(CoinGeckoSource::new(http.clone())),
        Arc::new(CoinDeskSource::new(http.clone())),
        Arc::new(CryptoCompareSource::new(http)),
    ]
}
