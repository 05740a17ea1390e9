//! Cryptographic hash functions.

use sha2::{Digest, Sha256};

/// Length of the hex prefix used when a token has to appear in logs.
const FINGERPRINT_LEN: usize = 12;

/// Compute SHA-256 hash.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Short, non-reversible identifier for a token, safe to log.
pub fn fingerprint(token: &str) -> String {
    let mut digest = sha256_hex(token.as_bytes());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
