//! CryptoSwap Balance Store
//!
//! Fixed-point balances per (user, currency), with a single atomic primitive
//! for the two-sided update an exchange performs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryBalanceStore;
pub use postgres::PgBalanceStore;
pub use store::{BalanceChange, BalanceStore, ExchangeLegs, ExchangeReceipt, Holding, UserRegistry};
