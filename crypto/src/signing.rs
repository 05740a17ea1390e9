//! HS256 key material for intent tokens.

use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::{Result, TokenError};

/// Shortest secret accepted for signing.
pub const MIN_SECRET_LEN: usize = 16;

/// A symmetric secret used to sign and verify tokens.
///
/// Rotating the secret invalidates every outstanding token.
#[derive(Clone)]
pub struct SigningSecret {
    key: Vec<u8>,
    key_id: String,
}

impl SigningSecret {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::InvalidKey(format!(
                "secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                bytes.len()
            )));
        }

        let key_id = crate::hash::sha256_hex(bytes)[..8].to_string();
        Ok(Self {
            key: bytes.to_vec(),
            key_id,
        })
    }

    /// Short identifier derived from the secret, safe to log.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.key)
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.key)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
