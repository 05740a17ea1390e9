//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

use cryptoswap_common::{constants, DurationExt};
use cryptoswap_crypto::MIN_SECRET_LEN;
use cryptoswap_fx::http::DEFAULT_PRICE_URL;

/// Main service configuration, read once at startup.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub db_max_connections: u32,
    /// Redis URL for the redemption guard; in-memory guard when absent.
    pub redis_url: Option<String>,
    /// Secret used to sign intent tokens.
    pub jwt_secret: String,
    /// Price endpoint template with `{base}` and `{quote}` placeholders.
    pub price_api_url: String,
    /// Bound on each price request.
    pub price_api_timeout: Duration,
    /// How long a quote can be redeemed.
    pub quote_ttl: Duration,
    /// Sweep interval for the in-memory redemption guard.
    pub guard_cleanup_interval: Duration,
    /// Directory holding seed JSON files, if seeding is wanted.
    pub seed_data_dir: Option<PathBuf>,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: "postgres://localhost/cryptoswap".to_string(),
            db_max_connections: 10,
            redis_url: None,
            jwt_secret: String::new(),
            price_api_url: DEFAULT_PRICE_URL.to_string(),
            price_api_timeout: constants::oracle_timeout().as_std(),
            quote_ttl: constants::quote_validity().as_std(),
            guard_cleanup_interval: constants::guard_cleanup_interval().as_std(),
            seed_data_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("listen_addr", &self.listen_addr)
            .field("listen_port", &self.listen_port)
            .field("db_max_connections", &self.db_max_connections)
            .field("redis", &self.redis_url.is_some())
            .field("price_api_url", &self.price_api_url)
            .field("price_api_timeout", &self.price_api_timeout)
            .field("quote_ttl", &self.quote_ttl)
            .field("seed_data_dir", &self.seed_data_dir)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(port) = lookup("LISTEN_PORT") {
            config.listen_port = parse("LISTEN_PORT", &port)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS") {
            config.db_max_connections = parse("DB_MAX_CONNECTIONS", &max)?;
        }
        config.redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        if let Some(secret) = lookup("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(url) = lookup("PRICE_API_URL") {
            config.price_api_url = url;
        }
        if let Some(secs) = lookup("PRICE_API_TIMEOUT_SECS") {
            config.price_api_timeout = Duration::from_secs(parse("PRICE_API_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("QUOTE_TTL_SECS") {
            config.quote_ttl = Duration::from_secs(parse("QUOTE_TTL_SECS", &secs)?);
        }
        config.seed_data_dir = lookup("SEED_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "JWT_SECRET must be set and at least {} bytes",
                MIN_SECRET_LEN
            ));
        }

        if !self.price_api_url.contains("{base}") || !self.price_api_url.contains("{quote}") {
            return Err("Price API URL must contain {base} and {quote}".to_string());
        }

        if self.price_api_timeout.is_zero() {
            return Err("Price API timeout cannot be 0".to_string());
        }

        if self.quote_ttl.is_zero() {
            return Err("Quote TTL cannot be 0".to_string());
        }

        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for {}: {:?}", key, value))
}
