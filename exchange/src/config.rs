//! Exchange configuration.

use std::str::FromStr;
use std::time::Duration;

use coinrate_common::{constants, CurrencyPair, DurationExt};
use coinrate_fx::RateCacheConfig;
use rust_decimal::Decimal;

/// Rate acquisition configuration.
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Upper bound on a single provider call.
    pub provider_timeout: Duration,
    /// Age at which the cached rate is refetched.
    pub refresh_interval: Duration,
    /// Refetch stale rates on read.
    pub auto_refresh: bool,
    /// Synthetic price served when nothing is cached and every provider fails.
    pub fallback_price: Option<Decimal>,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            provider_timeout: constants::provider_timeout(),
            refresh_interval: constants::rate_refresh_interval().as_std(),
            auto_refresh: true,
            fallback_price: None,
        }
    }
}

impl RateConfig {
    /// Cache settings for the BTC/CAD pair.
    pub fn cache_config(&self) -> RateCacheConfig {
        RateCacheConfig {
            refresh_interval: chrono::Duration::from_std(self.refresh_interval)
                .unwrap_or_else(|_| constants::rate_refresh_interval()),
            auto_refresh: self.auto_refresh,
            fallback_price: self.fallback_price,
            pair: CurrencyPair::btc_cad(),
        }
    }
}

/// Trade execution configuration.
#[derive(Debug, Clone)]
pub struct TradeConfig {
    /// Processing fee in percent, taken from the received side.
    pub fee_percent: Decimal,
    /// Smallest primary-currency value a trade may have.
    pub min_primary: Option<Decimal>,
    /// Largest primary-currency value a trade may have.
    pub max_primary: Option<Decimal>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            fee_percent: Decimal::ZERO,
            min_primary: Some(Decimal::new(1000, 2)),
            max_primary: Some(Decimal::new(5_000_000, 2)),
        }
    }
}

impl TradeConfig {
    /// No fee and no limits.
    pub fn unrestricted() -> Self {
        Self {
            fee_percent: Decimal::ZERO,
            min_primary: None,
            max_primary: None,
        }
    }
}

/// Administrative account created at startup.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_primary: Decimal,
    pub admin_secondary: Decimal,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_primary: Decimal::ZERO,
            admin_secondary: Decimal::ZERO,
        }
    }
}

/// Main exchange configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Rate configuration.
    pub rate_config: RateConfig,
    /// Trade configuration.
    pub trade_config: TradeConfig,
    /// Bootstrap configuration.
    pub bootstrap_config: BootstrapConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            rate_config: RateConfig::default(),
            trade_config: TradeConfig::default(),
            bootstrap_config: BootstrapConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unparsable values
    /// leave the default in place.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("EXCHANGE_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(port) = parsed(&lookup, "EXCHANGE_LISTEN_PORT") {
            config.listen_port = port;
        }

        let rate = &mut config.rate_config;
        if let Some(ms) = parsed::<u64>(&lookup, "RATE_PROVIDER_TIMEOUT_MS") {
            rate.provider_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "RATE_REFRESH_INTERVAL_SECS") {
            rate.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(enabled) = parsed(&lookup, "RATE_AUTO_REFRESH") {
            rate.auto_refresh = enabled;
        }
        if let Some(price) = parsed(&lookup, "RATE_FALLBACK_PRICE") {
            rate.fallback_price = Some(price);
        }

        let trade = &mut config.trade_config;
        if let Some(fee) = parsed(&lookup, "TRADE_FEE_PERCENT") {
            trade.fee_percent = fee;
        }
        if let Some(min) = parsed(&lookup, "TRADE_MIN_PRIMARY") {
            trade.min_primary = Some(min);
        }
        if let Some(max) = parsed(&lookup, "TRADE_MAX_PRIMARY") {
            trade.max_primary = Some(max);
        }

        let bootstrap = &mut config.bootstrap_config;
        if let Some(username) = lookup("ADMIN_USERNAME") {
            bootstrap.admin_username = username;
        }
        if let Some(primary) = parsed(&lookup, "ADMIN_SEED_PRIMARY") {
            bootstrap.admin_primary = primary;
        }
        if let Some(secondary) = parsed(&lookup, "ADMIN_SEED_SECONDARY") {
            bootstrap.admin_secondary = secondary;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        let rate = &self.rate_config;
        if rate.provider_timeout.is_zero() {
            return Err("Provider timeout cannot be 0".to_string());
        }
        if rate.refresh_interval.is_zero() {
            return Err("Refresh interval cannot be 0".to_string());
        }
        if matches!(rate.fallback_price, Some(price) if price <= Decimal::ZERO) {
            return Err("Fallback price must be positive".to_string());
        }

        let trade = &self.trade_config;
        if trade.fee_percent < Decimal::ZERO || trade.fee_percent >= Decimal::ONE_HUNDRED {
            return Err("Fee percent must be in [0, 100)".to_string());
        }
        if let (Some(min), Some(max)) = (trade.min_primary, trade.max_primary) {
            if min > max {
                return Err("Minimum trade cannot exceed maximum trade".to_string());
            }
        }

        let bootstrap = &self.bootstrap_config;
        if bootstrap.admin_username.trim().is_empty() {
            return Err("Admin username cannot be empty".to_string());
        }
        if bootstrap.admin_primary < Decimal::ZERO || bootstrap.admin_secondary < Decimal::ZERO {
            return Err("Admin seed balances cannot be negative".to_string());
        }

        Ok(())
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}
