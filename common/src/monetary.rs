//! Currency and denomination types.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency or asset code (ISO 4217 for fiat, ticker for crypto assets).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BTC" => 8,
            "ETH" => 18,
            _ => 2,
        }
    }

    /// Truncate an amount to this currency's precision.
    ///
    /// Amounts delivered to an account are never rounded up.
    pub fn truncate(&self, value: Decimal) -> Decimal {
        let places = self.decimal_places();
        let mut truncated = value.round_dp_with_strategy(places, RoundingStrategy::ToZero);
        truncated.rescale(places);
        truncated
    }

    pub fn cad() -> Self {
        Self::new("CAD")
    }

    pub fn btc() -> Self {
        Self::new("BTC")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A priced pair: `quote` units per one unit of `base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Asset being priced (the secondary denomination).
    pub base: Currency,
    /// Pricing currency (the primary denomination).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// The pair this exchange trades: BTC priced in CAD.
    pub fn btc_cad() -> Self {
        Self::new(Currency::btc(), Currency::cad())
    }

    /// Currency backing the given ledger denomination.
    pub fn currency_of(&self, denomination: Denomination) -> &Currency {
        match denomination {
            Denomination::Primary => &self.quote,
            Denomination::Secondary => &self.base,
        }
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        Self::btc_cad()
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// The two balances every account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    /// Fiat-like balance (the pair's quote currency).
    Primary,
    /// Asset-like balance (the pair's base currency).
    Secondary,
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denomination::Primary => write!(f, "primary"),
            Denomination::Secondary => write!(f, "secondary"),
        }
    }
}

/// Direction of a trade, from the account holder's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// Spend primary, receive secondary.
    Buy,
    /// Spend secondary, receive primary.
    Sell,
}

impl TradeDirection {
    /// Denomination the trade amount is expressed in and debited from.
    pub fn spends(&self) -> Denomination {
        match self {
            TradeDirection::Buy => Denomination::Primary,
            TradeDirection::Sell => Denomination::Secondary,
        }
    }

    /// Denomination credited by the trade.
    pub fn receives(&self) -> Denomination {
        match self {
            TradeDirection::Buy => Denomination::Secondary,
            TradeDirection::Sell => Denomination::Primary,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_decimal_places() {
        assert_eq!(Currency::cad().decimal_places(), 2);
        assert_eq!(Currency::btc().decimal_places(), 8);
        assert_eq!(Currency::new("jpy").decimal_places(), 0);
    }

    #[test]
    fn test_truncate_never_rounds_up() {
        assert_eq!(Currency::cad().truncate(dec!(599.999)), dec!(599.99));
        assert_eq!(Currency::btc().truncate(dec!(0.123456789)), dec!(0.12345678));
        assert_eq!(Currency::btc().truncate(dec!(0.01)).to_string(), "0.01000000");
    }

    #[test]
    fn test_direction_denominations() {
        let pair = CurrencyPair::btc_cad();
        assert_eq!(pair.currency_of(TradeDirection::Buy.spends()), &Currency::cad());
        assert_eq!(pair.currency_of(TradeDirection::Buy.receives()), &Currency::btc());
        assert_eq!(TradeDirection::Sell.spends(), Denomination::Secondary);
        assert_eq!(pair.to_string(), "BTC/CAD");
    }
}
