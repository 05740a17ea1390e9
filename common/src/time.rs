//! Time utilities and constants for CryptoSwap.

use chrono::{DateTime, Duration, Utc};

/// Protocol timing constants.
pub mod constants {
    use super::Duration;

    /// How long an issued quote can be redeemed (60 seconds).
    pub fn quote_validity() -> Duration {
        Duration::seconds(60)
    }

    /// Price oracle request timeout (10 seconds).
    pub fn oracle_timeout() -> Duration {
        Duration::seconds(10)
    }

    /// Interval between sweeps of expired redemption records (5 seconds).
    pub fn guard_cleanup_interval() -> Duration {
        Duration::seconds(5)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
