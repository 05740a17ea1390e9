//! Price oracle with reference-currency cross rates.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use cryptoswap_common::{Currency, CurrencyPair, FxRate};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;

/// Configuration for the price oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Currency used to synthesize cross rates.
    pub reference_currency: Currency,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            reference_currency: Currency::usd(),
        }
    }
}

/// Resolves exchange rates, falling back to a cross rate through the
/// reference currency when the direct pair is not tradable.
///
/// The fallback goes exactly one level deep. Errors are never retried here.
pub struct PriceOracle {
    provider: Arc<dyn RateProvider>,
    config: OracleConfig,
}

impl PriceOracle {
    /// Create an oracle with the default USD reference currency.
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self::with_config(provider, OracleConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(provider: Arc<dyn RateProvider>, config: OracleConfig) -> Self {
        Self { provider, config }
    }

    /// Reference currency for cross rates and valuations.
    pub fn reference_currency(&self) -> &Currency {
        &self.config.reference_currency
    }

    /// Get the rate converting one unit of `base` into `quote`.
    #[instrument(skip(self), fields(base = %base, quote = %quote))]
    pub async fn rate(&self, base: &Currency, quote: &Currency) -> FxResult<FxRate> {
        let pair = CurrencyPair::new(base.clone(), quote.clone());
        if pair.is_identity() {
            return Ok(FxRate::new(pair, Decimal::ONE, "IDENTITY"));
        }

        match self.provider.get_rate(&pair).await {
            Ok(rate) => validate(rate),
            Err(FxError::PairNotTradable { reason, .. }) => {
                debug!(pair = %pair, reason = %reason, "Direct pair not tradable, using cross rate");
                self.cross_rate(&pair).await
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "Rate lookup failed");
                Err(e)
            }
        }
    }

    /// `price(base, REF) / price(quote, REF)`, with no further fallback.
    async fn cross_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate> {
        let base_ref = self.reference_price(&pair.base, pair).await?;
        let quote_ref = self.reference_price(&pair.quote, pair).await?;

        let rate = base_ref
            .checked_div(quote_ref)
            .ok_or_else(|| FxError::RateNotAvailable(pair.clone()))?;

        debug!(
            pair = %pair,
            base_ref = %base_ref,
            quote_ref = %quote_ref,
            rate = %rate,
            "Synthesized cross rate"
        );

        validate(FxRate::new(
            pair.clone(),
            rate,
            format!("CROSS/{}", self.config.reference_currency),
        ))
    }

    async fn reference_price(&self, currency: &Currency, original: &CurrencyPair) -> FxResult<Decimal> {
        let reference = &self.config.reference_currency;
        if currency == reference {
            return Ok(Decimal::ONE);
        }

        let leg = CurrencyPair::new(currency.clone(), reference.clone());
        match self.provider.get_rate(&leg).await {
            Ok(rate) => Ok(validate(rate)?.rate),
            Err(FxError::PairNotTradable { .. }) => {
                warn!(pair = %original, leg = %leg, "Reference leg not tradable");
                Err(FxError::RateNotAvailable(original.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

fn validate(rate: FxRate) -> FxResult<FxRate> {
    if rate.rate <= Decimal::ZERO {
        return Err(FxError::InvalidRate {
            pair: rate.pair,
            rate: rate.rate,
        });
    }
    Ok(rate)
}
