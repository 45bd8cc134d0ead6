//! Append-only record of balance mutations.

use chrono::{DateTime, Utc};
use coinrate_common::{AccountId, EntryId, TradeDirection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balance::Balances;

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "direction", rename_all = "camelCase")]
pub enum EntryKind {
    /// Balances seeded when the account was opened.
    Seed,
    /// Conversion executed by the account holder.
    Trade(TradeDirection),
    /// Absolute overwrite by an administrator.
    AdminSet,
}

/// A single journal entry in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub before: Balances,
    pub after: Balances,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(account_id: AccountId, kind: EntryKind, before: Balances, after: Balances) -> Self {
        Self {
            id: EntryId::new(),
            account_id,
            kind,
            before,
            after,
            created_at: Utc::now(),
        }
    }

    /// Signed change to the primary balance.
    pub fn primary_delta(&self) -> Decimal {
        self.after.primary - self.before.primary
    }

    /// Signed change to the secondary balance.
    pub fn secondary_delta(&self) -> Decimal {
        self.after.secondary - self.before.secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_deltas() {
        let entry = JournalEntry::new(
            AccountId::new(),
            EntryKind::Trade(TradeDirection::Buy),
            Balances::new(dec!(1000), dec!(0)),
            Balances::new(dec!(500), dec!(0.01)),
        );

        assert_eq!(entry.primary_delta(), dec!(-500));
        assert_eq!(entry.secondary_delta(), dec!(0.01));
    }

    #[test]
    fn test_entry_kind_wire_shape() {
        let json = serde_json::to_value(EntryKind::Trade(TradeDirection::Sell)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "trade", "direction": "sell"}));
    }
}
