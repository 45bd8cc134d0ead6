//! In-memory ledger engine.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

use coinrate_common::{AccountId, ExchangeError, Result};

use crate::account::Account;
use crate::balance::{BalanceUpdate, Balances};
use crate::journal::{EntryKind, JournalEntry};

/// Holds every account and its journal.
///
/// Each mutation runs while holding the account's map entry exclusively, so
/// the sufficiency check and the write are atomic with respect to any other
/// mutation of the same account.
pub struct Ledger {
    accounts: DashMap<AccountId, Account>,
    usernames: DashMap<String, AccountId>,
    journal: DashMap<AccountId, Vec<JournalEntry>>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
            journal: DashMap::new(),
        }
    }

    /// Register an account with zero balances.
    pub fn open_account(&self, username: &str, is_admin: bool) -> Result<Account> {
        self.seed_account(username, is_admin, Balances::zero())
    }

    /// Register an account with initial balances.
    pub fn seed_account(&self, username: &str, is_admin: bool, balances: Balances) -> Result<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ExchangeError::InvalidRequest("username must not be empty".into()));
        }
        BalanceUpdate {
            primary: Some(balances.primary),
            secondary: Some(balances.secondary),
        }
        .validate()?;

        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(_) => Err(ExchangeError::DuplicateAccount(username.to_string())),
            Entry::Vacant(slot) => {
                let mut account = Account::new(username, is_admin);
                if balances != Balances::zero() {
                    account.apply(balances);
                    self.append(JournalEntry::new(
                        account.id,
                        EntryKind::Seed,
                        Balances::zero(),
                        balances,
                    ));
                }
                self.accounts.insert(account.id, account.clone());
                slot.insert(account.id);

                info!(account = %account.id, username, is_admin, "Account opened");
                Ok(account)
            }
        }
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &AccountId) -> Result<Account> {
        self.accounts
            .get(id)
            .map(|account| account.clone())
            .ok_or(ExchangeError::AccountNotFound(*id))
    }

    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        let id = *self.usernames.get(username.trim())?;
        self.accounts.get(&id).map(|account| account.clone())
    }

    /// Administrative absolute overwrite of either or both balances.
    pub fn set_balances(&self, id: &AccountId, update: &BalanceUpdate) -> Result<Account> {
        update.validate()?;

        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(ExchangeError::AccountNotFound(*id))?;
        if update.is_empty() {
            return Ok(account.clone());
        }

        let before = account.balances();
        let after = update.applied_to(before);
        account.apply(after);
        self.append(JournalEntry::new(*id, EntryKind::AdminSet, before, after));

        info!(
            account = %id,
            primary = %after.primary,
            secondary = %after.secondary,
            "Balances set by administrator"
        );
        Ok(account.clone())
    }

    /// Apply signed deltas to both balances atomically.
    ///
    /// Rejected in full when either resulting balance would be negative.
    pub fn adjust_balances(
        &self,
        id: &AccountId,
        delta_primary: Decimal,
        delta_secondary: Decimal,
        kind: EntryKind,
    ) -> Result<Account> {
        let mut account = self
            .accounts
            .get_mut(id)
            .ok_or(ExchangeError::AccountNotFound(*id))?;

        let before = account.balances();
        let after = before.checked_apply(delta_primary, delta_secondary).map_err(|e| {
            debug!(account = %id, error = %e, "Balance adjustment rejected");
            e
        })?;
        account.apply(after);
        self.append(JournalEntry::new(*id, kind, before, after));

        Ok(account.clone())
    }

    /// Journal entries for an account, oldest first.
    pub fn entries(&self, id: &AccountId) -> Vec<JournalEntry> {
        self.journal
            .get(id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn append(&self, entry: JournalEntry) {
        self.journal.entry(entry.account_id).or_default().push(entry);
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinrate_common::{Denomination, TradeDirection};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn funded(ledger: &Ledger, primary: Decimal, secondary: Decimal) -> AccountId {
        ledger
            .seed_account("alice", false, Balances::new(primary, secondary))
            .unwrap()
            .id
    }

    #[test]
    fn test_open_account_starts_at_zero() {
        let ledger = Ledger::new();
        let account = ledger.open_account("alice", false).unwrap();

        assert_eq!(account.balances(), Balances::zero());
        assert_eq!(ledger.get_account(&account.id).unwrap(), account);
        assert!(ledger.entries(&account.id).is_empty());
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let ledger = Ledger::new();
        ledger.open_account("alice", false).unwrap();

        let result = ledger.open_account(" alice ", false);

        assert_eq!(result, Err(ExchangeError::DuplicateAccount("alice".into())));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_unknown_account() {
        let ledger = Ledger::new();
        let id = AccountId::new();

        assert_eq!(ledger.get_account(&id), Err(ExchangeError::AccountNotFound(id)));
        assert!(ledger
            .adjust_balances(&id, dec!(1), dec!(0), EntryKind::AdminSet)
            .is_err());
    }

    #[test]
    fn test_seeded_account_is_journaled() {
        let ledger = Ledger::new();
        let id = funded(&ledger, dec!(1000), dec!(1));

        let entries = ledger.entries(&id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Seed);
        assert_eq!(ledger.find_by_username("alice").unwrap().id, id);
    }

    #[test]
    fn test_adjust_applies_both_deltas() {
        let ledger = Ledger::new();
        let id = funded(&ledger, dec!(1000), dec!(0));

        let account = ledger
            .adjust_balances(&id, dec!(-500), dec!(0.01), EntryKind::Trade(TradeDirection::Buy))
            .unwrap();

        assert_eq!(account.balances(), Balances::new(dec!(500), dec!(0.01)));
        assert_eq!(ledger.entries(&id).len(), 2);
    }

    #[test]
    fn test_adjust_rejects_without_partial_mutation() {
        let ledger = Ledger::new();
        let id = funded(&ledger, dec!(100), dec!(0));

        let result =
            ledger.adjust_balances(&id, dec!(-500), dec!(0.01), EntryKind::Trade(TradeDirection::Buy));

        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientBalance { denomination: Denomination::Primary, .. })
        ));
        let account = ledger.get_account(&id).unwrap();
        assert_eq!(account.balances(), Balances::new(dec!(100), dec!(0)));
        assert_eq!(ledger.entries(&id).len(), 1);
    }

    #[test]
    fn test_adjust_overflow_is_rejected_and_lock_released() {
        let ledger = Ledger::new();
        let id = funded(&ledger, Decimal::MAX, dec!(1));

        let result =
            ledger.adjust_balances(&id, dec!(600), dec!(-0.01), EntryKind::Trade(TradeDirection::Sell));

        assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
        let account = ledger.get_account(&id).unwrap();
        assert_eq!(account.balances(), Balances::new(Decimal::MAX, dec!(1)));
        assert_eq!(ledger.entries(&id).len(), 1);
        assert!(ledger
            .adjust_balances(&id, dec!(-1), dec!(0), EntryKind::AdminSet)
            .is_ok());
    }

    #[test]
    fn test_set_balances_overwrites_supplied_fields_only() {
        let ledger = Ledger::new();
        let id = funded(&ledger, dec!(100), dec!(2));

        let account = ledger
            .set_balances(&id, &BalanceUpdate { primary: Some(dec!(250)), secondary: None })
            .unwrap();

        assert_eq!(account.balances(), Balances::new(dec!(250), dec!(2)));
        assert_eq!(ledger.entries(&id).last().unwrap().kind, EntryKind::AdminSet);
    }

    #[test]
    fn test_set_balances_rejects_negative() {
        let ledger = Ledger::new();
        let id = funded(&ledger, dec!(100), dec!(2));

        let result = ledger.set_balances(
            &id,
            &BalanceUpdate { primary: Some(dec!(5)), secondary: Some(dec!(-1)) },
        );

        assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
        assert_eq!(ledger.get_account(&id).unwrap().balances(), Balances::new(dec!(100), dec!(2)));
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let ledger = Arc::new(Ledger::new());
        let id = funded(&ledger, dec!(1000), dec!(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| {
                            ledger
                                .adjust_balances(&id, dec!(-7), dec!(0), EntryKind::AdminSet)
                                .is_ok()
                        })
                        .count()
                })
            })
            .collect();
        let successes: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let account = ledger.get_account(&id).unwrap();
        assert_eq!(successes, 142);
        assert_eq!(account.primary_balance, dec!(6));
    }

    proptest! {
        #[test]
        fn prop_adjustments_never_go_negative(
            deltas in proptest::collection::vec((-500i64..500, -500i64..500), 1..64)
        ) {
            let ledger = Ledger::new();
            let id = funded(&ledger, dec!(100), dec!(100));

            for (p, s) in deltas {
                let _ = ledger.adjust_balances(
                    &id,
                    Decimal::new(p, 2),
                    Decimal::new(s, 2),
                    EntryKind::AdminSet,
                );
                let account = ledger.get_account(&id).unwrap();
                prop_assert!(account.primary_balance >= Decimal::ZERO);
                prop_assert!(account.secondary_balance >= Decimal::ZERO);
            }
        }
    }
}
