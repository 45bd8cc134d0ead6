//! Balance snapshots and administrative balance updates.

use coinrate_common::{Denomination, ExchangeError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Both balances of an account at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub primary: Decimal,
    pub secondary: Decimal,
}

impl Balances {
    pub fn new(primary: Decimal, secondary: Decimal) -> Self {
        Self { primary, secondary }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    pub fn get(&self, denomination: Denomination) -> Decimal {
        match denomination {
            Denomination::Primary => self.primary,
            Denomination::Secondary => self.secondary,
        }
    }

    /// Apply signed deltas to both balances, or neither.
    ///
    /// Fails with `InsufficientBalance` naming the first balance that would
    /// go negative, or `InvalidAmount` when a result is not representable.
    pub fn checked_apply(&self, delta_primary: Decimal, delta_secondary: Decimal) -> Result<Self> {
        let next = Self::new(
            checked_sum(Denomination::Primary, self.primary, delta_primary)?,
            checked_sum(Denomination::Secondary, self.secondary, delta_secondary)?,
        );

        for (denomination, delta) in [
            (Denomination::Primary, delta_primary),
            (Denomination::Secondary, delta_secondary),
        ] {
            if next.get(denomination) < Decimal::ZERO {
                return Err(ExchangeError::InsufficientBalance {
                    denomination,
                    required: delta.abs(),
                    available: self.get(denomination),
                });
            }
        }

        Ok(next)
    }
}

fn checked_sum(denomination: Denomination, balance: Decimal, delta: Decimal) -> Result<Decimal> {
    balance.checked_add(delta).ok_or_else(|| {
        ExchangeError::InvalidAmount(format!(
            "{denomination} balance {balance} cannot absorb {delta}"
        ))
    })
}

impl Default for Balances {
    fn default() -> Self {
        Self::zero()
    }
}

/// Administrative absolute overwrite. Omitted fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    #[serde(default, rename = "primaryBalance")]
    pub primary: Option<Decimal>,
    #[serde(default, rename = "secondaryBalance")]
    pub secondary: Option<Decimal>,
}

impl BalanceUpdate {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// Reject negative targets.
    pub fn validate(&self) -> Result<()> {
        for (denomination, value) in [
            (Denomination::Primary, self.primary),
            (Denomination::Secondary, self.secondary),
        ] {
            if let Some(value) = value {
                if value < Decimal::ZERO {
                    return Err(ExchangeError::InvalidAmount(format!(
                        "{denomination} balance must not be negative, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Balances after applying this update to `current`.
    pub fn applied_to(&self, current: Balances) -> Balances {
        Balances::new(
            self.primary.unwrap_or(current.primary),
            self.secondary.unwrap_or(current.secondary),
        )
    }
}
