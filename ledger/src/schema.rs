//! Table bootstrap and seed data loading.

use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    username VARCHAR(255) NOT NULL UNIQUE
)"#;

const CREATE_CRYPTOCURRENCIES: &str = r#"
CREATE TABLE IF NOT EXISTS cryptocurrencies (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    symbol VARCHAR(50) NOT NULL UNIQUE,
    is_available BOOLEAN NOT NULL,
    scale INT NOT NULL CHECK (scale BETWEEN 0 AND 18)
)"#;

const CREATE_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS balances (
    id SERIAL PRIMARY KEY,
    user_id INT NOT NULL REFERENCES users(id),
    crypto_id INT NOT NULL REFERENCES cryptocurrencies(id),
    balance BIGINT NOT NULL CHECK (balance >= 0),
    UNIQUE (user_id, crypto_id)
)"#;

/// Create the tables if they do not exist yet.
pub async fn create_tables(pool: &PgPool) -> LedgerResult<()> {
    for statement in [CREATE_USERS, CREATE_CRYPTOCURRENCIES, CREATE_BALANCES] {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database tables ready");
    Ok(())
}

/// A row of `cryptocurrency.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCurrency {
    pub name: String,
    pub symbol: String,
    pub is_available: bool,
    pub scale: u32,
}

/// A row of `users.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
}

/// A row of `balances.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedBalance {
    pub user_id: i32,
    pub crypto_id: i32,
    pub balance: i64,
}

/// Contents of a seed directory.
#[derive(Debug, Clone)]
pub struct SeedData {
    pub currencies: Vec<SeedCurrency>,
    pub users: Vec<SeedUser>,
    pub balances: Vec<SeedBalance>,
}

impl SeedData {
    /// Read `cryptocurrency.json`, `users.json` and `balances.json`.
    pub fn load(dir: &Path) -> LedgerResult<Self> {
        let data = Self {
            currencies: read_json(&dir.join("cryptocurrency.json"))?,
            users: read_json(&dir.join("users.json"))?,
            balances: read_json(&dir.join("balances.json"))?,
        };
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> LedgerResult<()> {
        if let Some(c) = self
            .currencies
            .iter()
            .find(|c| c.scale > cryptoswap_common::MAX_SCALE)
        {
            return Err(LedgerError::Seed(format!(
                "currency {} has scale {}",
                c.symbol, c.scale
            )));
        }
        if let Some(b) = self.balances.iter().find(|b| b.balance < 0) {
            return Err(LedgerError::Seed(format!(
                "negative balance for user {} crypto {}",
                b.user_id, b.crypto_id
            )));
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> LedgerResult<Vec<T>> {
    let bytes = std::fs::read(path)
        .map_err(|e| LedgerError::Seed(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LedgerError::Seed(format!("{}: {}", path.display(), e)))
}

/// Insert seed rows, skipping any that already exist.
pub async fn seed_from_dir(pool: &PgPool, dir: &Path) -> LedgerResult<()> {
    let data = SeedData::load(dir)?;
    let mut tx = pool.begin().await?;

    for currency in &data.currencies {
        sqlx::query(
            r#"
            INSERT INTO cryptocurrencies (name, symbol, is_available, scale)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&currency.name)
        .bind(currency.symbol.trim().to_uppercase())
        .bind(currency.is_available)
        .bind(currency.scale as i32)
        .execute(&mut *tx)
        .await?;
    }

    for user in &data.users {
        sqlx::query("INSERT INTO users (username) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(&user.username)
            .execute(&mut *tx)
            .await?;
    }

    for balance in &data.balances {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, crypto_id, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, crypto_id) DO NOTHING
            "#,
        )
        .bind(balance.user_id)
        .bind(balance.crypto_id)
        .bind(balance.balance)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        currencies = data.currencies.len(),
        users = data.users.len(),
        balances = data.balances.len(),
        "Seed data loaded"
    );
    Ok(())
}
