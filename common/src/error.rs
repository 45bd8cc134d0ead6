//! Error taxonomy surfaced to callers of the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccountId, Denomination};

/// Main error type for exchange operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Amount is zero, negative or outside the configured trade limits.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Balance cannot cover the debit.
    #[error("Insufficient {denomination} balance: required {required}, available {available}")]
    InsufficientBalance {
        denomination: Denomination,
        required: Decimal,
        available: Decimal,
    },

    /// No current rate could be obtained for a trade.
    #[error("Exchange rate unavailable")]
    RateUnavailable,

    /// Every upstream provider failed.
    #[error("All rate providers are unavailable ({attempts} attempted)")]
    AllProvidersUnavailable { attempts: usize },

    /// Malformed request that is not an amount problem.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate values violate the record invariants.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Unknown account.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Username already registered.
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// No resolved account on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Caller lacks the admin capability.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ExchangeError {
    /// Check if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateUnavailable | ExchangeError::AllProvidersUnavailable { .. }
        )
    }

    /// Stable machine-readable kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidAmount(_) => "INVALID_AMOUNT",
            ExchangeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ExchangeError::RateUnavailable => "RATE_UNAVAILABLE",
            ExchangeError::AllProvidersUnavailable { .. } => "ALL_PROVIDERS_UNAVAILABLE",
            ExchangeError::InvalidRequest(_) => "INVALID_REQUEST",
            ExchangeError::InvalidRate(_) => "INVALID_RATE",
            ExchangeError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ExchangeError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            ExchangeError::Unauthenticated => "UNAUTHENTICATED",
            ExchangeError::Unauthorized(_) => "UNAUTHORIZED",
            ExchangeError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Serializable rejection returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Stable error kind.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl Rejection {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&ExchangeError> for Rejection {
    fn from(err: &ExchangeError) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}
