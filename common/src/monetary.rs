//! Monetary types for CryptoSwap.
//!
//! Balances are stored as signed 64-bit integers scaled by a per-currency
//! decimal exponent. Everything the user sees is a [`Decimal`]; the integer
//! form only exists at the store boundary, and conversions into it always
//! truncate toward zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest supported currency scale. `10^18` still fits in a `u64`.
pub const MAX_SCALE: u32 = 18;

/// Errors converting between decimal and fixed-point amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Scale is outside `0..=MAX_SCALE`.
    #[error("Scale {0} out of range (max {MAX_SCALE})")]
    ScaleOutOfRange(u32),

    /// The scaled value does not fit in a 64-bit balance.
    #[error("Amount {0} overflows the fixed-point range")]
    Overflow(Decimal),
}

/// `10^scale` as a decimal.
pub fn scale_factor(scale: u32) -> Result<Decimal, AmountError> {
    if scale > MAX_SCALE {
        return Err(AmountError::ScaleOutOfRange(scale));
    }
    Ok(Decimal::from(10u64.pow(scale)))
}

/// Interpret a stored integer balance as a decimal amount.
pub fn to_decimal(raw: i64, scale: u32) -> Result<Decimal, AmountError> {
    if scale > MAX_SCALE {
        return Err(AmountError::ScaleOutOfRange(scale));
    }
    Decimal::try_new(raw, scale).map_err(|_| AmountError::ScaleOutOfRange(scale))
}

/// Convert a decimal amount to its stored integer form, truncating toward zero.
pub fn to_fixed_point(amount: Decimal, scale: u32) -> Result<i64, AmountError> {
    let factor = scale_factor(scale)?;
    let scaled = amount
        .checked_mul(factor)
        .ok_or(AmountError::Overflow(amount))?
        .trunc();
    scaled.to_i64().ok_or(AmountError::Overflow(amount))
}

/// Drop any digits beyond `scale`, rounding toward zero.
pub fn truncate_to_scale(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Currency ticker symbol, e.g. `BTC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from its symbol.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the currency symbol.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Reference currency used for cross rates and valuations.
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn btc() -> Self {
        Self::new("BTC")
    }

    pub fn eth() -> Self {
        Self::new("ETH")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Registry entry for a tradable currency.
///
/// `scale` is fixed for the life of the currency: every stored balance is
/// interpreted through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    /// Registry row ID.
    pub id: i32,
    /// Ticker symbol (unique).
    pub symbol: Currency,
    /// Display name.
    pub name: String,
    /// Number of fractional digits carried by stored balances.
    pub scale: u32,
    /// Whether the currency can currently be exchanged.
    pub available: bool,
}

impl CurrencyInfo {
    /// Create a registry entry, validating the scale.
    pub fn new(
        id: i32,
        symbol: Currency,
        name: impl Into<String>,
        scale: u32,
        available: bool,
    ) -> Result<Self, AmountError> {
        if scale > MAX_SCALE {
            return Err(AmountError::ScaleOutOfRange(scale));
        }
        Ok(Self {
            id,
            symbol,
            name: name.into(),
            scale,
            available,
        })
    }

    /// Stored integer form of `amount` in this currency.
    pub fn to_fixed_point(&self, amount: Decimal) -> Result<i64, AmountError> {
        to_fixed_point(amount, self.scale)
    }

    /// Decimal form of a stored balance in this currency.
    pub fn to_decimal(&self, raw: i64) -> Result<Decimal, AmountError> {
        to_decimal(raw, self.scale)
    }

    /// Truncate `amount` to the precision this currency can hold.
    pub fn truncate(&self, amount: Decimal) -> Decimal {
        truncate_to_scale(amount, self.scale)
    }
}

/// A currency pair for FX operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (being sold).
    pub base: Currency,
    /// Quote currency (pricing currency).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Whether both sides are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Exchange rate: one unit of `pair.base` buys `rate` units of `pair.quote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxRate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Conversion factor.
    pub rate: Decimal,
    /// When this rate was quoted.
    pub quoted_at: chrono::DateTime<chrono::Utc>,
    /// Rate source.
    pub source: String,
}

impl FxRate {
    /// Create a new FX rate.
    pub fn new(pair: CurrencyPair, rate: Decimal, source: impl Into<String>) -> Self {
        Self {
            pair,
            rate,
            quoted_at: chrono::Utc::now(),
            source: source.into(),
        }
    }
}
