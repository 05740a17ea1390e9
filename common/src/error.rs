//! Error taxonomy for CryptoSwap exchange operations.

use crate::{AmountError, Currency, UserId};
use thiserror::Error;

/// Coarse classification used by transport adapters to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Referenced entity does not exist.
    NotFound,
    /// Caller supplied an unusable request.
    BadRequest,
    /// Request conflicts with current state (spent token, short balance).
    Conflict,
    /// An external dependency is down.
    Unavailable,
    /// Store-layer failure.
    Internal,
}

/// Main error type for exchange operations.
///
/// Every variant is surfaced to the caller as-is; none is retried internally.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Currency symbol is not registered.
    #[error("Currency not found: {0}")]
    CurrencyNotFound(Currency),

    /// Currency is registered but disabled for exchange.
    #[error("Currency unavailable: {0}")]
    CurrencyUnavailable(Currency),

    /// User is not registered.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Amount is non-positive, unrepresentable, or the pair is degenerate.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Price oracle failed or returned an undecodable response.
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// Token has a bad signature, has expired, or was already redeemed.
    #[error("Token invalid or expired")]
    TokenInvalidOrExpired,

    /// Source balance does not cover the quoted amount.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// Store-layer I/O error.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl ExchangeError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::CurrencyNotFound(_) => "CURRENCY_NOT_FOUND",
            ExchangeError::CurrencyUnavailable(_) => "CURRENCY_UNAVAILABLE",
            ExchangeError::UserNotFound(_) => "USER_NOT_FOUND",
            ExchangeError::InvalidAmount(_) => "INVALID_AMOUNT",
            ExchangeError::QuoteUnavailable(_) => "QUOTE_UNAVAILABLE",
            ExchangeError::TokenInvalidOrExpired => "TOKEN_INVALID_OR_EXPIRED",
            ExchangeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ExchangeError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Classify the error for transport mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExchangeError::CurrencyNotFound(_) | ExchangeError::UserNotFound(_) => {
                ErrorClass::NotFound
            }
            ExchangeError::CurrencyUnavailable(_) | ExchangeError::InvalidAmount(_) => {
                ErrorClass::BadRequest
            }
            ExchangeError::TokenInvalidOrExpired | ExchangeError::InsufficientBalance { .. } => {
                ErrorClass::Conflict
            }
            ExchangeError::QuoteUnavailable(_) => ErrorClass::Unavailable,
            ExchangeError::PersistenceFailure(_) => ErrorClass::Internal,
        }
    }
}

impl From<AmountError> for ExchangeError {
    fn from(err: AmountError) -> Self {
        ExchangeError::InvalidAmount(err.to_string())
    }
}

/// Result type alias for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
