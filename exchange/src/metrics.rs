//! Metrics collection for exchange monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Exchange metrics.
pub struct Metrics {
    /// Quotes requested.
    pub quotes_total: AtomicU64,
    /// Quotes issued with a token.
    pub quotes_issued: AtomicU64,
    /// Quotes that failed validation or pricing.
    pub quotes_failed: AtomicU64,
    /// Exchanges applied to balances.
    pub exchanges_finalized: AtomicU64,
    /// Finalize attempts that did not apply.
    pub exchanges_rejected: AtomicU64,
    /// Tokens presented after they were already consumed or expired.
    pub replays_rejected: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            quotes_total: AtomicU64::new(0),
            quotes_issued: AtomicU64::new(0),
            quotes_failed: AtomicU64::new(0),
            exchanges_finalized: AtomicU64::new(0),
            exchanges_rejected: AtomicU64::new(0),
            replays_rejected: AtomicU64::new(0),
        }
    }

    /// Record an issued quote.
    pub fn quote_issued(&self) {
        self.quotes_total.fetch_add(1, Ordering::Relaxed);
        self.quotes_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed quote.
    pub fn quote_failed(&self) {
        self.quotes_total.fetch_add(1, Ordering::Relaxed);
        self.quotes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an applied exchange.
    pub fn exchange_finalized(&self) {
        self.exchanges_finalized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected finalize.
    pub fn exchange_rejected(&self) {
        self.exchanges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a token that failed the single-use check.
    pub fn replay_rejected(&self) {
        self.replays_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            quotes_total: self.quotes_total.load(Ordering::Relaxed),
            quotes_issued: self.quotes_issued.load(Ordering::Relaxed),
            quotes_failed: self.quotes_failed.load(Ordering::Relaxed),
            exchanges_finalized: self.exchanges_finalized.load(Ordering::Relaxed),
            exchanges_rejected: self.exchanges_rejected.load(Ordering::Relaxed),
            replays_rejected: self.replays_rejected.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP cryptoswap_quotes_total Total number of quote requests
# TYPE cryptoswap_quotes_total counter
cryptoswap_quotes_total {}

# HELP cryptoswap_quotes_issued Total quotes issued
# TYPE cryptoswap_quotes_issued counter
cryptoswap_quotes_issued {}

# HELP cryptoswap_quotes_failed Total failed quote requests
# TYPE cryptoswap_quotes_failed counter
cryptoswap_quotes_failed {}

# HELP cryptoswap_exchanges_finalized Total exchanges applied
# TYPE cryptoswap_exchanges_finalized counter
cryptoswap_exchanges_finalized {}

# HELP cryptoswap_exchanges_rejected Total rejected finalize requests
# TYPE cryptoswap_exchanges_rejected counter
cryptoswap_exchanges_rejected {}

# HELP cryptoswap_replays_rejected Total tokens rejected as already used or expired
# TYPE cryptoswap_replays_rejected counter
cryptoswap_replays_rejected {}
"#,
            snapshot.quotes_total,
            snapshot.quotes_issued,
            snapshot.quotes_failed,
            snapshot.exchanges_finalized,
            snapshot.exchanges_rejected,
            snapshot.replays_rejected,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub quotes_total: u64,
    pub quotes_issued: u64,
    pub quotes_failed: u64,
    pub exchanges_finalized: u64,
    pub exchanges_rejected: u64,
    pub replays_rejected: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.quote_issued();
        metrics.quote_issued();
        metrics.quote_failed();
        metrics.exchange_rejected();
        metrics.replay_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.quotes_total, 3);
        assert_eq!(snapshot.quotes_issued, 2);
        assert_eq!(snapshot.quotes_failed, 1);
        assert_eq!(snapshot.exchanges_rejected, 1);
        assert_eq!(snapshot.replays_rejected, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.exchange_finalized();

        let output = metrics.to_prometheus();
        assert!(output.contains("cryptoswap_exchanges_finalized 1"));
        assert!(output.contains("cryptoswap_quotes_total 0"));
    }
}
