//! Single-use redemption records for intent tokens.
//!
//! A record is created when a quote is issued and deleted by the first
//! finalize that presents the token. Deletion is what stops a replay, so
//! [`RedemptionGuard::consume_if_present`] must check and delete in one
//! atomic step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::Client;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cryptoswap_common::ExchangeError;
use cryptoswap_crypto::{fingerprint, sha256_hex};

/// Errors from the guard backend.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Redemption guard connection error: {0}")]
    Connection(String),

    #[error("Redemption guard command failed: {0}")]
    Command(String),
}

pub type GuardResult<T> = Result<T, GuardError>;

impl From<GuardError> for ExchangeError {
    fn from(err: GuardError) -> Self {
        ExchangeError::PersistenceFailure(err.to_string())
    }
}

impl From<redis::RedisError> for GuardError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            GuardError::Connection(err.to_string())
        } else {
            GuardError::Command(err.to_string())
        }
    }
}

/// Store of outstanding, not yet redeemed tokens.
#[async_trait]
pub trait RedemptionGuard: Send + Sync {
    /// Record a freshly minted token for `ttl`.
    async fn register(&self, token: &str, ttl: Duration) -> GuardResult<()>;

    /// Atomically remove the token's record, returning whether a live one
    /// was present. Expired records count as absent.
    async fn consume_if_present(&self, token: &str) -> GuardResult<bool>;
}

/// In-process guard keyed by token hash.
#[derive(Default)]
pub struct MemoryRedemptionGuard {
    entries: DashMap<String, Instant>,
}

impl MemoryRedemptionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired records. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Sweep expired records every `interval` until the task is aborted.
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    debug!(purged, "Purged expired redemption records");
                }
            }
        })
    }
}

#[async_trait]
impl RedemptionGuard for MemoryRedemptionGuard {
    async fn register(&self, token: &str, ttl: Duration) -> GuardResult<()> {
        self.entries
            .insert(sha256_hex(token.as_bytes()), Instant::now() + ttl);
        debug!(token = %fingerprint(token), "Redemption record registered");
        Ok(())
    }

    async fn consume_if_present(&self, token: &str) -> GuardResult<bool> {
        let removed = self.entries.remove(&sha256_hex(token.as_bytes()));
        let live = matches!(removed, Some((_, expires_at)) if expires_at > Instant::now());
        debug!(token = %fingerprint(token), live, "Redemption record consumed");
        Ok(live)
    }
}

/// Redis-backed guard, shared by every service instance.
#[derive(Clone)]
pub struct RedisRedemptionGuard {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisRedemptionGuard {
    /// Default key prefix.
    pub const DEFAULT_PREFIX: &'static str = "cryptoswap:intent:";

    /// Connect to Redis.
    pub async fn connect(url: &str) -> GuardResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(url).map_err(|e| GuardError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| GuardError::Connection(e.to_string()))?;

        info!("Redis connection established");

        Ok(Self {
            manager,
            prefix: Self::DEFAULT_PREFIX.to_string(),
        })
    }

    fn key(&self, token: &str) -> String {
        record_key(&self.prefix, token)
    }

    /// Health check.
    pub async fn health_check(&self) -> GuardResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

fn record_key(prefix: &str, token: &str) -> String {
    format!("{}{}", prefix, sha256_hex(token.as_bytes()))
}

#[async_trait]
impl RedemptionGuard for RedisRedemptionGuard {
    async fn register(&self, token: &str, ttl: Duration) -> GuardResult<()> {
        let mut conn = self.manager.clone();
        // Redis rejects EX 0.
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(self.key(token))
            .arg(1)
            .arg("EX")
            .arg(seconds)
            .query_async::<()>(&mut conn)
            .await?;
        debug!(token = %fingerprint(token), ttl_secs = seconds, "Redemption record registered");
        Ok(())
    }

    async fn consume_if_present(&self, token: &str) -> GuardResult<bool> {
        let mut conn = self.manager.clone();
        let deleted = redis::cmd("DEL")
            .arg(self.key(token))
            .query_async::<i64>(&mut conn)
            .await?;
        debug!(token = %fingerprint(token), deleted, "Redemption record consumed");
        Ok(deleted == 1)
    }
}
