//! Simulated trade execution against the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use coinrate_common::{
    AccountId, CurrencyPair, Denomination, ExchangeError, RateRecord, Result, TradeDirection,
};
use coinrate_ledger::{EntryKind, Ledger};

use crate::config::TradeConfig;

/// A request to trade on behalf of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub account_id: AccountId,
    pub direction: TradeDirection,
    /// Primary amount for a buy, secondary amount for a sell.
    pub amount: Decimal,
}

impl TradeRequest {
    pub fn buy(account_id: AccountId, primary_amount: Decimal) -> Self {
        Self {
            account_id,
            direction: TradeDirection::Buy,
            amount: primary_amount,
        }
    }

    pub fn sell(account_id: AccountId, secondary_amount: Decimal) -> Self {
        Self {
            account_id,
            direction: TradeDirection::Sell,
            amount: secondary_amount,
        }
    }
}

/// Amounts a trade would move, computed without touching any balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuote {
    pub direction: TradeDirection,
    /// Primary debited (buy) or credited (sell).
    pub amount_primary: Decimal,
    /// Secondary credited (buy) or debited (sell).
    pub amount_secondary: Decimal,
    /// Fee withheld, in primary units.
    pub fee_primary: Decimal,
    pub rate_used: Decimal,
}

/// Outcome of an executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResult {
    pub direction: TradeDirection,
    pub amount_primary: Decimal,
    pub amount_secondary: Decimal,
    pub fee_primary: Decimal,
    pub rate_used: Decimal,
    pub resulting_primary_balance: Decimal,
    pub resulting_secondary_balance: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Prices trades and commits them to the ledger.
///
/// The executor is stateless apart from its configuration; the rate is passed
/// in by value for each trade so it cannot move between the computation and
/// the ledger write.
#[derive(Debug, Clone)]
pub struct TradeExecutor {
    config: TradeConfig,
    pair: CurrencyPair,
}

impl TradeExecutor {
    pub fn new(config: TradeConfig) -> Self {
        Self {
            config,
            pair: CurrencyPair::btc_cad(),
        }
    }

    pub fn config(&self) -> &TradeConfig {
        &self.config
    }

    /// Compute the amounts a trade of `amount` would move at `rate`.
    ///
    /// Received amounts are truncated to the receiving currency's precision;
    /// the debited amount is taken exactly.
    pub fn quote(
        &self,
        direction: TradeDirection,
        amount: Decimal,
        rate: &RateRecord,
    ) -> Result<TradeQuote> {
        let price = rate.price;
        if price <= Decimal::ZERO {
            return Err(ExchangeError::RateUnavailable);
        }
        self.validate_amount(direction, amount)?;

        let keep = (Decimal::ONE_HUNDRED - self.config.fee_percent) / Decimal::ONE_HUNDRED;
        let quote = match direction {
            TradeDirection::Buy => {
                self.check_limits(amount)?;
                let net = amount.checked_mul(keep).ok_or_else(out_of_range)?;
                let received = net.checked_div(price).ok_or_else(out_of_range)?;
                TradeQuote {
                    direction,
                    amount_primary: amount,
                    amount_secondary: self.truncate(Denomination::Secondary, received),
                    fee_primary: amount - net,
                    rate_used: price,
                }
            }
            TradeDirection::Sell => {
                let gross = amount.checked_mul(price).ok_or_else(out_of_range)?;
                self.check_limits(gross)?;
                let net = gross.checked_mul(keep).ok_or_else(out_of_range)?;
                TradeQuote {
                    direction,
                    amount_primary: self.truncate(Denomination::Primary, net),
                    amount_secondary: amount,
                    fee_primary: gross - net,
                    rate_used: price,
                }
            }
        };

        let received = match direction {
            TradeDirection::Buy => quote.amount_secondary,
            TradeDirection::Sell => quote.amount_primary,
        };
        if received.is_zero() {
            return Err(ExchangeError::InvalidAmount(format!(
                "{} {} is too small to receive any {}",
                direction,
                amount,
                self.pair.currency_of(direction.receives())
            )));
        }

        Ok(quote)
    }

    /// Execute a trade at `rate`.
    ///
    /// Rejections leave the ledger untouched.
    pub fn execute(
        &self,
        ledger: &Ledger,
        request: &TradeRequest,
        rate: &RateRecord,
    ) -> Result<TradeResult> {
        let quote = self
            .quote(request.direction, request.amount, rate)
            .map_err(|e| {
                debug!(account = %request.account_id, error = %e, "Trade rejected");
                e
            })?;

        let (delta_primary, delta_secondary) = match request.direction {
            TradeDirection::Buy => (-quote.amount_primary, quote.amount_secondary),
            TradeDirection::Sell => (quote.amount_primary, -quote.amount_secondary),
        };

        let account = ledger
            .adjust_balances(
                &request.account_id,
                delta_primary,
                delta_secondary,
                EntryKind::Trade(request.direction),
            )
            .map_err(|e| {
                debug!(account = %request.account_id, error = %e, "Trade rejected");
                e
            })?;

        info!(
            account = %request.account_id,
            direction = %request.direction,
            primary = %quote.amount_primary,
            secondary = %quote.amount_secondary,
            rate = %quote.rate_used,
            "Trade executed"
        );

        Ok(TradeResult {
            direction: quote.direction,
            amount_primary: quote.amount_primary,
            amount_secondary: quote.amount_secondary,
            fee_primary: quote.fee_primary,
            rate_used: quote.rate_used,
            resulting_primary_balance: account.primary_balance,
            resulting_secondary_balance: account.secondary_balance,
            executed_at: Utc::now(),
        })
    }

    fn validate_amount(&self, direction: TradeDirection, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let currency = self.pair.currency_of(direction.spends());
        if amount.normalize().scale() > currency.decimal_places() {
            return Err(ExchangeError::InvalidAmount(format!(
                "{} supports at most {} decimal places",
                currency,
                currency.decimal_places()
            )));
        }
        Ok(())
    }

    /// Bounds apply to the primary-currency value of the trade.
    fn check_limits(&self, primary_value: Decimal) -> Result<()> {
        if let Some(min) = self.config.min_primary {
            if primary_value < min {
                return Err(ExchangeError::InvalidAmount(format!(
                    "trade value {} is below the minimum of {}",
                    primary_value, min
                )));
            }
        }
        if let Some(max) = self.config.max_primary {
            if primary_value > max {
                return Err(ExchangeError::InvalidAmount(format!(
                    "trade value {} exceeds the maximum of {}",
                    primary_value, max
                )));
            }
        }
        Ok(())
    }

    fn truncate(&self, denomination: Denomination, value: Decimal) -> Decimal {
        self.pair.currency_of(denomination).truncate(value)
    }
}

impl Default for TradeExecutor {
    fn default() -> Self {
        Self::new(TradeConfig::default())
    }
}

fn out_of_range() -> ExchangeError {
    ExchangeError::InvalidAmount("amount is out of range".into())
}
