//! Coinrate Common Types
//!
//! Shared types used across the exchange crates: identifiers, currencies,
//! the canonical rate record, the error taxonomy and timing constants.

pub mod identifiers;
pub mod monetary;
pub mod rate;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use rate::*;
pub use error::*;
pub use time::*;
