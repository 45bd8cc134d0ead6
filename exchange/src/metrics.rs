//! Metrics collection for exchange monitoring.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use coinrate_common::TradeDirection;
use coinrate_fx::{CacheSnapshot, CascadeSnapshot, RateState};

/// Exchange metrics.
pub struct Metrics {
    /// Executed buys.
    pub buys_executed: AtomicU64,
    /// Executed sells.
    pub sells_executed: AtomicU64,
    /// Rejected buys.
    pub buys_rejected: AtomicU64,
    /// Rejected sells.
    pub sells_rejected: AtomicU64,
    /// Rate overrides set.
    pub rate_overrides: AtomicU64,
    /// Successful resets to live.
    pub rate_resets: AtomicU64,
    /// Resets that failed because no source answered.
    pub rate_reset_failures: AtomicU64,
    /// Accounts registered.
    pub accounts_opened: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            buys_executed: AtomicU64::new(0),
            sells_executed: AtomicU64::new(0),
            buys_rejected: AtomicU64::new(0),
            sells_rejected: AtomicU64::new(0),
            rate_overrides: AtomicU64::new(0),
            rate_resets: AtomicU64::new(0),
            rate_reset_failures: AtomicU64::new(0),
            accounts_opened: AtomicU64::new(0),
        }
    }

    pub fn trade_executed(&self, direction: TradeDirection) {
        match direction {
            TradeDirection::Buy => self.buys_executed.fetch_add(1, Ordering::Relaxed),
            TradeDirection::Sell => self.sells_executed.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn trade_rejected(&self, direction: TradeDirection) {
        match direction {
            TradeDirection::Buy => self.buys_rejected.fetch_add(1, Ordering::Relaxed),
            TradeDirection::Sell => self.sells_rejected.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn rate_override_set(&self) {
        self.rate_overrides.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate_reset(&self, succeeded: bool) {
        if succeeded {
            self.rate_resets.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rate_reset_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn account_opened(&self) {
        self.accounts_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buys_executed: self.buys_executed.load(Ordering::Relaxed),
            sells_executed: self.sells_executed.load(Ordering::Relaxed),
            buys_rejected: self.buys_rejected.load(Ordering::Relaxed),
            sells_rejected: self.sells_rejected.load(Ordering::Relaxed),
            rate_overrides: self.rate_overrides.load(Ordering::Relaxed),
            rate_resets: self.rate_resets.load(Ordering::Relaxed),
            rate_reset_failures: self.rate_reset_failures.load(Ordering::Relaxed),
            accounts_opened: self.accounts_opened.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format, together with the rate cache and
    /// cascade counters.
    pub fn to_prometheus(&self, cache: &CacheSnapshot, cascade: Option<&CascadeSnapshot>) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        counter(&mut out, "trades_total", "Trades executed", &[
            ("direction=\"buy\"", snapshot.buys_executed),
            ("direction=\"sell\"", snapshot.sells_executed),
        ]);
        counter(&mut out, "trades_rejected_total", "Trades rejected", &[
            ("direction=\"buy\"", snapshot.buys_rejected),
            ("direction=\"sell\"", snapshot.sells_rejected),
        ]);
        counter(&mut out, "rate_overrides_total", "Administrative rate overrides", &[
            ("", snapshot.rate_overrides),
        ]);
        counter(&mut out, "rate_resets_total", "Resets to the live rate", &[
            ("outcome=\"ok\"", snapshot.rate_resets),
            ("outcome=\"failed\"", snapshot.rate_reset_failures),
        ]);
        counter(&mut out, "accounts_opened_total", "Accounts registered", &[
            ("", snapshot.accounts_opened),
        ]);

        counter(&mut out, "rate_reads_total", "Current-rate reads", &[("", cache.reads)]);
        counter(&mut out, "rate_refreshes_total", "Rate refresh attempts", &[
            ("outcome=\"ok\"", cache.refreshes),
            ("outcome=\"failed\"", cache.refresh_failures),
        ]);
        counter(&mut out, "rate_degraded_total", "Reads served without a fresh rate", &[
            ("served=\"stale\"", cache.stale_served),
            ("served=\"fallback\"", cache.fallback_served),
        ]);
        gauge_state(&mut out, cache.state);

        if let Some(cascade) = cascade {
            counter(&mut out, "provider_attempts_total", "Individual provider calls", &[
                ("", cascade.attempts),
            ]);
            counter(&mut out, "provider_failures_total", "Individual provider failures", &[
                ("", cascade.failures),
            ]);
            counter(&mut out, "cascade_exhausted_total", "Passes in which every provider failed", &[
                ("", cascade.exhausted),
            ]);
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(out: &mut String, name: &str, help: &str, samples: &[(&str, u64)]) {
    let _ = writeln!(out, "# HELP coinrate_{name} {help}");
    let _ = writeln!(out, "# TYPE coinrate_{name} counter");
    for (labels, value) in samples {
        if labels.is_empty() {
            let _ = writeln!(out, "coinrate_{name} {value}");
        } else {
            let _ = writeln!(out, "coinrate_{name}{{{labels}}} {value}");
        }
    }
    out.push('\n');
}

fn gauge_state(out: &mut String, current: RateState) {
    let _ = writeln!(out, "# HELP coinrate_rate_state Current rate cache state");
    let _ = writeln!(out, "# TYPE coinrate_rate_state gauge");
    for (label, state) in [
        ("empty", RateState::Empty),
        ("fresh", RateState::Fresh),
        ("stale", RateState::Stale),
        ("pinned", RateState::Pinned),
    ] {
        let value = u8::from(state == current);
        let _ = writeln!(out, "coinrate_rate_state{{state=\"{label}\"}} {value}");
    }
    out.push('\n');
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub buys_executed: u64,
    pub sells_executed: u64,
    pub buys_rejected: u64,
    pub sells_rejected: u64,
    pub rate_overrides: u64,
    pub rate_resets: u64,
    pub rate_reset_failures: u64,
    pub accounts_opened: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
