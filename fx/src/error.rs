//! Rate acquisition error types.

use coinrate_common::ExchangeError;
use thiserror::Error;

/// Why a single provider attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// Connection or transport error.
    #[error("network error: {0}")]
    Network(String),

    /// The attempt exceeded the per-call timeout.
    #[error("timed out")]
    Timeout,

    /// Upstream answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// Payload could not be decoded.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// Payload decoded but the required price field was absent.
    #[error("price field missing")]
    MissingPrice,

    /// Price present but unusable.
    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

/// Errors that can occur while acquiring a rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    /// One provider failed. Recovered by the cascade.
    #[error("Rate provider {provider} failed: {cause}")]
    ProviderFailure { provider: String, cause: FailureCause },

    /// Every provider in the cascade failed.
    #[error("All rate providers unavailable ({attempts} attempted)")]
    AllProvidersUnavailable { attempts: usize },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Rejected administrative rate.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
}

impl FxError {
    pub fn provider(provider: impl Into<String>, cause: FailureCause) -> Self {
        FxError::ProviderFailure {
            provider: provider.into(),
            cause,
        }
    }
}

impl From<FxError> for ExchangeError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::AllProvidersUnavailable { attempts } => {
                ExchangeError::AllProvidersUnavailable { attempts }
            }
            FxError::InvalidRate(reason) => ExchangeError::InvalidRate(reason),
            FxError::ProviderFailure { .. } => ExchangeError::RateUnavailable,
            FxError::Client(reason) => ExchangeError::ConfigurationError(reason),
        }
    }
}

/// Result type for rate acquisition.
pub type FxResult<T> = Result<T, FxError>;
