//! CryptoSwap Price Oracle
//!
//! Fetches live exchange rates between cryptocurrencies.
//!
//! # Features
//!
//! - Pluggable rate providers behind the [`RateProvider`] trait
//! - HTTP provider for CryptoCompare-style price endpoints
//! - USD cross-rate fallback when a direct pair is not tradable
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cryptoswap_fx::{HttpRateProvider, HttpProviderConfig, PriceOracle};
//! use cryptoswap_common::Currency;
//!
//! let provider = HttpRateProvider::new(HttpProviderConfig::default())?;
//! let oracle = PriceOracle::new(Arc::new(provider));
//!
//! let rate = oracle.rate(&Currency::btc(), &Currency::eth()).await?;
//! ```

pub mod error;
pub mod http;
pub mod oracle;
pub mod provider;

pub use error::{FxError, FxResult};
pub use http::{HttpProviderConfig, HttpRateProvider};
pub use oracle::{OracleConfig, PriceOracle};
pub use provider::RateProvider;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
