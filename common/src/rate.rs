//! The canonical rate record and the administrative override payload.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, Result};
use crate::monetary::CurrencyPair;

/// Half-width of the 24h band synthesized when a source does not report one,
/// in percent of price. The band is derived, not observed.
pub const DERIVED_RANGE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Source label of a record set by an administrator.
pub const MANUAL_SOURCE: &str = "MANUAL";

/// Source label of the configured last-resort record.
pub const FALLBACK_SOURCE: &str = "FALLBACK";

/// One canonical quote. Replaced wholesale on refresh, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    /// The priced pair.
    pub pair: CurrencyPair,
    /// Quote currency per unit of the asset. Always positive.
    pub price: Decimal,
    /// 24h change in percent.
    pub change_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    /// When the quote was acquired.
    pub last_updated: DateTime<Utc>,
    /// Pinned by an administrator; exempt from age-based refresh.
    pub is_manual_override: bool,
    /// Provider name, `MANUAL` or `FALLBACK`.
    pub source: String,
    /// High/low were derived from price rather than reported.
    pub range_derived: bool,
    /// Hardcoded last-resort value, not a market observation.
    pub synthetic: bool,
}

impl RateRecord {
    /// Create a live record with no informational fields.
    pub fn new(pair: CurrencyPair, price: Decimal, source: impl Into<String>) -> Result<Self> {
        ensure_positive("price", price)?;
        Ok(Self {
            pair,
            price,
            change_24h: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            last_updated: Utc::now(),
            is_manual_override: false,
            source: source.into(),
            range_derived: false,
            synthetic: false,
        })
    }

    /// Create a pinned record from an administrator's override.
    pub fn manual(pair: CurrencyPair, request: &RateOverride) -> Result<Self> {
        request.validate()?;
        let mut record = Self::new(pair, request.price, MANUAL_SOURCE)?;
        record.change_24h = request.change_24h;
        record.high_24h = request.high_24h;
        record.low_24h = request.low_24h;
        record.volume_24h = request.volume_24h;
        record.is_manual_override = true;
        Ok(record)
    }

    /// Create the clearly flagged last-resort record.
    pub fn fallback(pair: CurrencyPair, price: Decimal) -> Result<Self> {
        let mut record = Self::new(pair, price, FALLBACK_SOURCE)?.with_derived_range()?;
        record.synthetic = true;
        Ok(record)
    }

    pub fn with_change_24h(mut self, change: Option<Decimal>) -> Self {
        self.change_24h = change;
        self
    }

    pub fn with_volume_24h(mut self, volume: Option<Decimal>) -> Self {
        self.volume_24h = volume;
        self
    }

    /// Synthesize the 24h band as price ± `DERIVED_RANGE_PERCENT`.
    ///
    /// Fails with `InvalidRate` when the band is not representable.
    pub fn with_derived_range(mut self) -> Result<Self> {
        self.high_24h = Some(scale_percent(self.price, Decimal::ONE_HUNDRED + DERIVED_RANGE_PERCENT)?);
        self.low_24h = Some(scale_percent(self.price, Decimal::ONE_HUNDRED - DERIVED_RANGE_PERCENT)?);
        self.range_derived = true;
        Ok(self)
    }

    /// Time elapsed since acquisition.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.last_updated)
    }

    /// Whether the record is at least `interval` old.
    pub fn is_older_than(&self, interval: Duration) -> bool {
        self.age() >= interval
    }
}

/// Body of an administrative "set rate" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOverride {
    pub price: Decimal,
    #[serde(default)]
    pub change_24h: Option<Decimal>,
    #[serde(default)]
    pub high_24h: Option<Decimal>,
    #[serde(default)]
    pub low_24h: Option<Decimal>,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
}

impl RateOverride {
    pub fn price(price: Decimal) -> Self {
        Self {
            price,
            change_24h: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
        }
    }

    /// Check the override before it replaces the current record.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("price", self.price)?;
        if let Some(high) = self.high_24h {
            ensure_positive("high24h", high)?;
        }
        if let Some(low) = self.low_24h {
            ensure_positive("low24h", low)?;
        }
        if let (Some(high), Some(low)) = (self.high_24h, self.low_24h) {
            if low > high {
                return Err(ExchangeError::InvalidRate(format!(
                    "low24h {low} exceeds high24h {high}"
                )));
            }
        }
        if let Some(volume) = self.volume_24h {
            if volume.is_sign_negative() {
                return Err(ExchangeError::InvalidRate(format!(
                    "volume24h must not be negative, got {volume}"
                )));
            }
        }
        Ok(())
    }
}

fn scale_percent(price: Decimal, percent: Decimal) -> Result<Decimal> {
    price
        .checked_mul(percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| ExchangeError::InvalidRate(format!("price {price} is out of range")))
}

fn ensure_positive(field: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(ExchangeError::InvalidRate(format!(
            "{field} must be positive, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_non_positive_price() {
        assert!(RateRecord::new(CurrencyPair::btc_cad(), Decimal::ZERO, "TEST").is_err());
        assert!(RateRecord::new(CurrencyPair::btc_cad(), dec!(-1), "TEST").is_err());
    }

    #[test]
    fn test_derived_range_is_five_percent_band() {
        let record = RateRecord::new(CurrencyPair::btc_cad(), dec!(100000), "TEST")
            .unwrap()
            .with_derived_range()
            .unwrap();

        assert_eq!(record.high_24h, Some(dec!(105000)));
        assert_eq!(record.low_24h, Some(dec!(95000)));
        assert!(record.range_derived);
    }

    #[test]
    fn test_derived_range_overflow_is_an_error() {
        let record = RateRecord::new(CurrencyPair::btc_cad(), Decimal::MAX, "TEST").unwrap();
        assert!(matches!(record.with_derived_range(), Err(ExchangeError::InvalidRate(_))));
    }

    #[test]
    fn test_manual_record_is_pinned() {
        let request = RateOverride {
            high_24h: Some(dec!(51000)),
            ..RateOverride::price(dec!(50000))
        };
        let record = RateRecord::manual(CurrencyPair::btc_cad(), &request).unwrap();

        assert!(record.is_manual_override);
        assert_eq!(record.source, MANUAL_SOURCE);
        assert_eq!(record.high_24h, Some(dec!(51000)));
        assert!(!record.range_derived);
    }

    #[test]
    fn test_override_with_inverted_band_is_rejected() {
        let request = RateOverride {
            high_24h: Some(dec!(100)),
            low_24h: Some(dec!(200)),
            ..RateOverride::price(dec!(150))
        };
        assert!(matches!(request.validate(), Err(ExchangeError::InvalidRate(_))));
    }

    #[test]
    fn test_fallback_is_flagged_synthetic() {
        let record = RateRecord::fallback(CurrencyPair::btc_cad(), dec!(164000)).unwrap();
        assert!(record.synthetic);
        assert!(!record.is_manual_override);
        assert_eq!(record.source, FALLBACK_SOURCE);
    }

    #[test]
    fn test_fallback_with_unrepresentable_band_is_rejected() {
        let result = RateRecord::fallback(CurrencyPair::btc_cad(), Decimal::MAX);
        assert!(matches!(result, Err(ExchangeError::InvalidRate(_))));
    }

    #[test]
    fn test_override_body_accepts_missing_optionals() {
        let request: RateOverride = serde_json::from_str(r#"{"price": "61000.5"}"#).unwrap();
        assert_eq!(request.price, dec!(61000.5));
        assert!(request.volume_24h.is_none());
    }
}
