//! Coinrate Exchange
//!
//! Simulated BTC/CAD trading on top of the rate cache and the ledger: trade
//! execution, the service facade handed to request handlers, configuration,
//! metrics and the HTTP surface.

pub mod config;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod service;

pub use config::{BootstrapConfig, ExchangeConfig, RateConfig, TradeConfig};
pub use executor::{TradeExecutor, TradeQuote, TradeRequest, TradeResult};
pub use metrics::{Metrics, MetricsSnapshot};
pub use service::{Caller, ExchangeService, SharedExchangeService};
