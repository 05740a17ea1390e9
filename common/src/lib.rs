//! CryptoSwap Common Types
//!
//! This crate contains shared types used across the CryptoSwap wallet,
//! including identifiers, fixed-point monetary types, and the error taxonomy
//! surfaced by the exchange engine.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
