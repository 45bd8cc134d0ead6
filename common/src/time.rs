//! Time utilities and constants for rate acquisition.

use chrono::Duration;

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// Upper bound on a single provider call (5 seconds).
    pub fn provider_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(5)
    }

    /// Age at which a live rate becomes stale (30 seconds).
    pub fn rate_refresh_interval() -> Duration {
        Duration::seconds(30)
    }
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
