//! Balance store errors.

use cryptoswap_common::{AmountError, Currency, ExchangeError, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the balance store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Currency not found: {0}")]
    CurrencyNotFound(Currency),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The debit leg exceeds the balance observed under lock.
    #[error("Insufficient {currency} balance: required {required}, available {available}")]
    InsufficientBalance {
        currency: Currency,
        required: Decimal,
        available: Decimal,
    },

    /// Balances are never negative.
    #[error("Negative balance {balance} for {currency}")]
    NegativeBalance { currency: Currency, balance: i64 },

    /// Legs that cannot form an exchange.
    #[error("Invalid exchange legs: {0}")]
    InvalidLegs(String),

    /// Credit would not fit the 64-bit balance column.
    #[error("Balance overflow for {0}")]
    Overflow(Currency),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Seed data error: {0}")]
    Seed(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Result type for store operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<LedgerError> for ExchangeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::CurrencyNotFound(currency) => ExchangeError::CurrencyNotFound(currency),
            LedgerError::UserNotFound(user) => ExchangeError::UserNotFound(user),
            LedgerError::InsufficientBalance {
                required,
                available,
                ..
            } => ExchangeError::InsufficientBalance {
                required: required.to_string(),
                available: available.to_string(),
            },
            LedgerError::NegativeBalance { .. } | LedgerError::InvalidLegs(_) => {
                ExchangeError::InvalidAmount(err.to_string())
            }
            LedgerError::Amount(e) => ExchangeError::InvalidAmount(e.to_string()),
            LedgerError::Overflow(_) | LedgerError::Seed(_) | LedgerError::Database(_) => {
                ExchangeError::PersistenceFailure(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_balance_maps_with_decimals() {
        let err: ExchangeError = LedgerError::InsufficientBalance {
            currency: Currency::btc(),
            required: dec!(40.00),
            available: dec!(12.50),
        }
        .into();

        match err {
            ExchangeError::InsufficientBalance {
                required,
                available,
            } => {
                assert_eq!(required, "40.00");
                assert_eq!(available, "12.50");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_database_error_is_persistence_failure() {
        let err: ExchangeError = LedgerError::from(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, ExchangeError::PersistenceFailure(_)));
    }
}
