//! CryptoSwap Exchange Service
//!
//! Wallet service that prices exchanges between cryptocurrencies and applies
//! them against fixed-point balances. An exchange is two-phase: a quote
//! mints a signed intent token, and finalize redeems that token at most once.

pub mod api;
pub mod config;
pub mod engine;
pub mod guard;
pub mod metrics;

pub use config::ServiceConfig;
pub use engine::{EngineConfig, ExchangeEngine, Quote, Valuation};
pub use guard::{GuardError, MemoryRedemptionGuard, RedemptionGuard, RedisRedemptionGuard};
pub use metrics::{Metrics, SharedMetrics};
