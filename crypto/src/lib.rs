//! CryptoSwap Cryptographic Primitives
//!
//! Provides the HS256 intent token codec and the hashing helpers used to
//! key redemption records.

pub mod hash;
pub mod signing;
pub mod token;

pub use hash::{fingerprint, sha256, sha256_hex};
pub use signing::{SigningSecret, MIN_SECRET_LEN};
pub use token::{IntentClaims, IntentTokenCodec};

use cryptoswap_common::ExchangeError;
use jsonwebtoken::errors::ErrorKind;

/// Errors from signing and token handling.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

pub type Result<T> = std::result::Result<T, TokenError>;

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnsupportedAlgorithm(err.to_string())
            }
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                TokenError::InvalidClaims(err.to_string())
            }
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

impl From<TokenError> for ExchangeError {
    fn from(err: TokenError) -> Self {
        match err {
            // Only minting can fail this way; no token exists yet.
            TokenError::EncodingFailed(msg) | TokenError::InvalidKey(msg) => {
                ExchangeError::QuoteUnavailable(msg)
            }
            _ => ExchangeError::TokenInvalidOrExpired,
        }
    }
}
