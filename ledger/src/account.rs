//! Account definitions for the ledger.

use chrono::{DateTime, Utc};
use coinrate_common::{AccountId, Denomination};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::Balances;

/// A principal holding one balance per denomination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Unique login name.
    pub username: String,
    /// Fiat-like balance.
    pub primary_balance: Decimal,
    /// Asset-like balance.
    pub secondary_balance: Decimal,
    /// Administrative capability.
    pub is_admin: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the balances were last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an account with zero balances.
    pub fn new(username: impl Into<String>, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            username: username.into(),
            primary_balance: Decimal::ZERO,
            secondary_balance: Decimal::ZERO,
            is_admin,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balances(&self) -> Balances {
        Balances::new(self.primary_balance, self.secondary_balance)
    }

    pub fn balance(&self, denomination: Denomination) -> Decimal {
        self.balances().get(denomination)
    }

    /// Replace both balances. Callers have already checked the invariant.
    pub(crate) fn apply(&mut self, balances: Balances) {
        self.primary_balance = balances.primary;
        self.secondary_balance = balances.secondary;
        self.updated_at = Utc::now();
    }
}
