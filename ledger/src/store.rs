//! Balance store traits and the records they exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cryptoswap_common::{AmountError, Currency, CurrencyInfo, UserId};

use crate::error::{LedgerError, LedgerResult};

/// Registry of known users.
#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Whether the user is registered.
    async fn user_exists(&self, user: UserId) -> LedgerResult<bool>;
}

/// Persistent fixed-point balances.
///
/// Implementations must make [`BalanceStore::apply_exchange`] atomic: both
/// legs land or neither does, and the debit is re-checked against the
/// balance seen while the rows are locked.
#[async_trait]
pub trait BalanceStore: UserRegistry {
    /// Look up a currency by symbol.
    async fn currency_info(&self, symbol: &Currency) -> LedgerResult<CurrencyInfo>;

    /// Scale of a currency.
    async fn scale_of(&self, symbol: &Currency) -> LedgerResult<u32> {
        Ok(self.currency_info(symbol).await?.scale)
    }

    /// Raw balance, 0 when the user has no row for the currency.
    async fn get_balance(&self, user: UserId, symbol: &Currency) -> LedgerResult<i64>;

    /// Every balance row the user has, ordered by symbol.
    async fn list_balances(&self, user: UserId) -> LedgerResult<Vec<Holding>>;

    /// Overwrite a balance with a new absolute value.
    async fn apply_delta(&self, user: UserId, symbol: &Currency, new_balance: i64)
        -> LedgerResult<()>;

    /// Debit the source and credit the target in one unit of work.
    async fn apply_exchange(&self, user: UserId, legs: &ExchangeLegs)
        -> LedgerResult<ExchangeReceipt>;
}

/// One user's balance in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub currency: CurrencyInfo,
    /// Raw balance in units of `10^-scale`.
    pub balance: i64,
}

impl Holding {
    /// Balance as a decimal amount.
    pub fn amount(&self) -> Result<Decimal, AmountError> {
        self.currency.to_decimal(self.balance)
    }
}

/// The two raw movements of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLegs {
    pub source: Currency,
    pub target: Currency,
    /// Raw amount taken from the source balance.
    pub debit: i64,
    /// Raw amount added to the target balance.
    pub credit: i64,
}

impl ExchangeLegs {
    /// Reject legs that could never be applied.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.source == self.target {
            return Err(LedgerError::InvalidLegs(format!(
                "source and target are both {}",
                self.source
            )));
        }
        if self.debit <= 0 {
            return Err(LedgerError::InvalidLegs(format!(
                "debit must be positive, got {}",
                self.debit
            )));
        }
        if self.credit <= 0 {
            return Err(LedgerError::InvalidLegs(format!(
                "credit must be positive, got {}",
                self.credit
            )));
        }
        Ok(())
    }

    /// New `(source, target)` balances given the ones observed under lock.
    pub fn settle(
        &self,
        source: &CurrencyInfo,
        source_before: i64,
        target_before: i64,
    ) -> LedgerResult<(i64, i64)> {
        if source_before < self.debit {
            return Err(LedgerError::InsufficientBalance {
                currency: self.source.clone(),
                required: source.to_decimal(self.debit)?,
                available: source.to_decimal(source_before)?,
            });
        }

        let target_after = target_before
            .checked_add(self.credit)
            .ok_or_else(|| LedgerError::Overflow(self.target.clone()))?;

        Ok((source_before - self.debit, target_after))
    }
}

/// Before and after values of one balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub currency: Currency,
    pub balance_before: i64,
    pub balance_after: i64,
    /// `balance_after` as a decimal amount.
    pub amount_after: Decimal,
}

impl BalanceChange {
    fn new(info: &CurrencyInfo, before: i64, after: i64) -> LedgerResult<Self> {
        Ok(Self {
            currency: info.symbol.clone(),
            balance_before: before,
            balance_after: after,
            amount_after: info.to_decimal(after)?,
        })
    }
}

/// Outcome of an applied exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub user_id: UserId,
    pub source: BalanceChange,
    pub target: BalanceChange,
    pub executed_at: DateTime<Utc>,
}

impl ExchangeReceipt {
    /// Built before the update is made durable, so a failure here still
    /// leaves both balances untouched.
    pub(crate) fn new(
        user_id: UserId,
        source_info: &CurrencyInfo,
        target_info: &CurrencyInfo,
        source: (i64, i64),
        target: (i64, i64),
    ) -> LedgerResult<Self> {
        Ok(Self {
            user_id,
            source: BalanceChange::new(source_info, source.0, source.1)?,
            target: BalanceChange::new(target_info, target.0, target.1)?,
            executed_at: Utc::now(),
        })
    }
}
