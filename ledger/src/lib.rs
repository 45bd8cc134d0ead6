//! Coinrate Ledger
//!
//! Per-account balances in two denominations, with an append-only journal of
//! every mutation. Balances never go negative.

pub mod account;
pub mod balance;
pub mod engine;
pub mod journal;

pub use account::Account;
pub use balance::{BalanceUpdate, Balances};
pub use engine::Ledger;
pub use journal::{EntryKind, JournalEntry};
