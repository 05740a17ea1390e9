//! Price oracle error types.

use cryptoswap_common::{CurrencyPair, ExchangeError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while obtaining a rate.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    /// The price service reports the pair as not tradable.
    #[error("Pair {pair} not tradable: {reason}")]
    PairNotTradable { pair: CurrencyPair, reason: String },

    /// Rate cannot be derived, not even through the reference currency.
    #[error("Rate not available for {0}")]
    RateNotAvailable(CurrencyPair),

    /// Provider returned a zero or negative rate.
    #[error("Invalid rate {rate} for {pair}")]
    InvalidRate { pair: CurrencyPair, rate: Decimal },

    /// Request did not complete in time.
    #[error("Rate request timed out for {0}")]
    Timeout(CurrencyPair),

    /// HTTP transport failed or returned a non-success status.
    #[error("Rate provider transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape.
    #[error("Unexpected rate response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for oracle operations.
pub type FxResult<T> = Result<T, FxError>;

impl From<FxError> for ExchangeError {
    fn from(err: FxError) -> Self {
        ExchangeError::QuoteUnavailable(err.to_string())
    }
}
