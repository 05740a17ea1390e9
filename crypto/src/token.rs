//! Intent tokens: HS256 JWTs carrying a priced exchange.
//!
//! Amounts travel as decimal strings so no precision is lost between quote
//! and finalize.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cryptoswap_common::{Currency, QuoteId, Timestamp};

use crate::signing::SigningSecret;
use crate::{Result, TokenError};

/// The priced exchange a token authorizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntentClaims {
    /// Unique per quote, so identical quotes mint distinct tokens.
    pub quote_id: QuoteId,
    pub source_currency: Currency,
    pub target_currency: Currency,
    #[serde(with = "decimal_string")]
    pub source_amount: Decimal,
    #[serde(with = "decimal_string")]
    pub target_amount: Decimal,
    /// Issue time, seconds since the Unix epoch.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry time, seconds since the Unix epoch.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl IntentClaims {
    /// Build claims for a fresh quote valid for `ttl` from `issued_at`.
    pub fn new(
        source_currency: Currency,
        target_currency: Currency,
        source_amount: Decimal,
        target_amount: Decimal,
        issued_at: Timestamp,
        ttl: Duration,
    ) -> Self {
        Self {
            quote_id: QuoteId::new(),
            source_currency,
            target_currency,
            source_amount,
            target_amount,
            issued_at: issued_at.timestamp(),
            expires_at: (issued_at + ttl).timestamp(),
        }
    }

    /// Expiry as a timestamp, at the whole-second precision the token carries.
    pub fn expiry(&self) -> Option<Timestamp> {
        chrono::DateTime::from_timestamp(self.expires_at, 0)
    }

    fn validate(&self, now: i64) -> Result<()> {
        if self.expires_at <= now {
            return Err(TokenError::Expired);
        }
        if self.issued_at > self.expires_at {
            return Err(TokenError::InvalidClaims("issued after expiry".to_string()));
        }
        if self.source_currency.code().is_empty() || self.target_currency.code().is_empty() {
            return Err(TokenError::InvalidClaims("empty currency".to_string()));
        }
        if self.source_currency == self.target_currency {
            return Err(TokenError::InvalidClaims(
                "source and target are the same currency".to_string(),
            ));
        }
        if self.source_amount <= Decimal::ZERO || self.target_amount <= Decimal::ZERO {
            return Err(TokenError::InvalidClaims("non-positive amount".to_string()));
        }
        Ok(())
    }
}

/// Mints and verifies intent tokens under one secret.
pub struct IntentTokenCodec {
    key_id: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl IntentTokenCodec {
    pub fn new(secret: SigningSecret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key_id: secret.key_id().to_string(),
            encoding: secret.encoding_key(),
            decoding: secret.decoding_key(),
            validation,
        }
    }

    /// Sign the claims into a compact token.
    pub fn encode(&self, claims: &IntentClaims) -> Result<String> {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.key_id.clone());
        encode(&header, claims, &self.encoding).map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify and decode a token against the current time.
    pub fn decode(&self, token: &str) -> Result<IntentClaims> {
        self.decode_at(token, Utc::now().timestamp())
    }

    /// Verify and decode a token as of `now` (seconds since the epoch).
    pub fn decode_at(&self, token: &str, now: i64) -> Result<IntentClaims> {
        let claims = decode::<IntentClaims>(token, &self.decoding, &self.validation)?.claims;
        claims.validate(now)?;

        debug!(quote_id = %claims.quote_id, "Token verified");
        Ok(claims)
    }
}

impl std::fmt::Debug for IntentTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentTokenCodec")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Decimal amounts as JSON strings only.
mod decimal_string {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<Decimal>().map_err(serde::de::Error::custom)
    }
}
