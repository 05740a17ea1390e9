//! Rate provider trait and test double.

use async_trait::async_trait;
use cryptoswap_common::{CurrencyPair, FxRate};

use crate::error::FxResult;

/// A source of live exchange rates.
///
/// Implementations perform a single lookup per call. Fallback and retry
/// policy live in [`crate::PriceOracle`] and its callers.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the direct rate for a currency pair.
    ///
    /// Returns [`crate::FxError::PairNotTradable`] when the service knows the
    /// symbols but does not quote the pair directly.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate>;
}

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use crate::error::FxError;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    enum MockEntry {
        Rate(Decimal),
        Untradeable,
        Failure(FxError),
    }

    /// Mock rate provider for testing.
    pub struct MockRateProvider {
        name: String,
        rates: dashmap::DashMap<String, MockEntry>,
        calls: AtomicUsize,
    }

    impl MockRateProvider {
        /// Create a new mock provider.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                rates: dashmap::DashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        /// Set a rate for a currency pair.
        pub fn set_rate(&self, pair: CurrencyPair, rate: Decimal) {
            self.rates.insert(pair.to_string(), MockEntry::Rate(rate));
        }

        /// Report the pair as not tradable.
        pub fn set_untradeable(&self, pair: CurrencyPair) {
            self.rates.insert(pair.to_string(), MockEntry::Untradeable);
        }

        /// Fail lookups for the pair with the given error.
        pub fn set_failure(&self, pair: CurrencyPair, error: FxError) {
            self.rates.insert(pair.to_string(), MockEntry::Failure(error));
        }

        /// Number of lookups served so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry = self.rates.get(&pair.to_string()).map(|e| e.clone());
            match entry {
                Some(MockEntry::Rate(rate)) => Ok(FxRate::new(pair.clone(), rate, &self.name)),
                Some(MockEntry::Untradeable) | None => Err(FxError::PairNotTradable {
                    pair: pair.clone(),
                    reason: "market does not exist for this coin pair".to_string(),
                }),
                Some(MockEntry::Failure(err)) => Err(err),
            }
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;
