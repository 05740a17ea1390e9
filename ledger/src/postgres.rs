//! PostgreSQL balance store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use cryptoswap_common::{Currency, CurrencyInfo, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{BalanceStore, ExchangeLegs, ExchangeReceipt, Holding, UserRegistry};

type CurrencyRow = (i32, String, String, bool, i32);

fn currency_from_row(row: CurrencyRow) -> LedgerResult<CurrencyInfo> {
    let (id, name, symbol, available, scale) = row;
    let scale = u32::try_from(scale).map_err(|_| {
        LedgerError::Database(format!("negative scale {} for {}", scale, symbol))
    })?;
    Ok(CurrencyInfo::new(
        id,
        Currency::new(symbol),
        name,
        scale,
        available,
    )?)
}

/// Balance store backed by the `users`, `cryptocurrencies` and `balances`
/// tables.
#[derive(Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_user(&self, user: UserId) -> LedgerResult<()> {
        if self.user_exists(user).await? {
            Ok(())
        } else {
            Err(LedgerError::UserNotFound(user))
        }
    }
}

#[async_trait]
impl UserRegistry for PgBalanceStore {
    async fn user_exists(&self, user: UserId) -> LedgerResult<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user.get())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn currency_info(&self, symbol: &Currency) -> LedgerResult<CurrencyInfo> {
        let row = sqlx::query_as::<_, CurrencyRow>(
            "SELECT id, name, symbol, is_available, scale FROM cryptocurrencies WHERE symbol = $1",
        )
        .bind(symbol.code())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::CurrencyNotFound(symbol.clone()))?;

        currency_from_row(row)
    }

    async fn get_balance(&self, user: UserId, symbol: &Currency) -> LedgerResult<i64> {
        let currency = self.currency_info(symbol).await?;
        let balance = sqlx::query_as::<_, (i64,)>(
            "SELECT balance FROM balances WHERE user_id = $1 AND crypto_id = $2",
        )
        .bind(user.get())
        .bind(currency.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.map(|(b,)| b).unwrap_or(0))
    }

    async fn list_balances(&self, user: UserId) -> LedgerResult<Vec<Holding>> {
        let rows = sqlx::query_as::<_, (i32, String, String, bool, i32, i64)>(
            r#"
            SELECT c.id, c.name, c.symbol, c.is_available, c.scale, b.balance
            FROM balances b
            JOIN cryptocurrencies c ON c.id = b.crypto_id
            WHERE b.user_id = $1
            ORDER BY c.symbol
            "#,
        )
        .bind(user.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, symbol, available, scale, balance)| {
                Ok(Holding {
                    currency: currency_from_row((id, name, symbol, available, scale))?,
                    balance,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(user_id = %user, currency = %symbol))]
    async fn apply_delta(
        &self,
        user: UserId,
        symbol: &Currency,
        new_balance: i64,
    ) -> LedgerResult<()> {
        if new_balance < 0 {
            return Err(LedgerError::NegativeBalance {
                currency: symbol.clone(),
                balance: new_balance,
            });
        }
        let currency = self.currency_info(symbol).await?;
        self.ensure_user(user).await?;

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, crypto_id, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, crypto_id) DO UPDATE SET
                balance = EXCLUDED.balance
            "#,
        )
        .bind(user.get())
        .bind(currency.id)
        .bind(new_balance)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, legs), fields(user_id = %user, source = %legs.source, target = %legs.target))]
    async fn apply_exchange(
        &self,
        user: UserId,
        legs: &ExchangeLegs,
    ) -> LedgerResult<ExchangeReceipt> {
        legs.validate()?;
        let source = self.currency_info(&legs.source).await?;
        let target = self.currency_info(&legs.target).await?;
        self.ensure_user(user).await?;

        // Dropping the transaction without commit rolls it back.
        let mut tx = self.pool.begin().await?;

        // Rows are created and locked in crypto_id order so two exchanges
        // over the same pair cannot deadlock.
        let mut ids = [source.id, target.id];
        ids.sort_unstable();
        for id in ids {
            sqlx::query(
                r#"
                INSERT INTO balances (user_id, crypto_id, balance)
                VALUES ($1, $2, 0)
                ON CONFLICT (user_id, crypto_id) DO NOTHING
                "#,
            )
            .bind(user.get())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let locked = sqlx::query_as::<_, (i32, i64)>(
            r#"
            SELECT crypto_id, balance FROM balances
            WHERE user_id = $1 AND crypto_id = ANY($2)
            ORDER BY crypto_id
            FOR UPDATE
            "#,
        )
        .bind(user.get())
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await?;

        let balance_of = |crypto_id: i32| {
            locked
                .iter()
                .find(|(id, _)| *id == crypto_id)
                .map(|(_, balance)| *balance)
                .ok_or_else(|| {
                    LedgerError::Database(format!("balance row {} vanished under lock", crypto_id))
                })
        };
        let source_before = balance_of(source.id)?;
        let target_before = balance_of(target.id)?;
        let (source_after, target_after) = legs.settle(&source, source_before, target_before)?;
        let receipt = ExchangeReceipt::new(
            user,
            &source,
            &target,
            (source_before, source_after),
            (target_before, target_after),
        )?;

        for (id, balance) in [(source.id, source_after), (target.id, target_after)] {
            sqlx::query("UPDATE balances SET balance = $3 WHERE user_id = $1 AND crypto_id = $2")
                .bind(user.get())
                .bind(id)
                .bind(balance)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            debit = legs.debit,
            credit = legs.credit,
            "Exchange committed"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_from_row() {
        let info = currency_from_row((3, "Ethereum".into(), "eth".into(), true, 8)).unwrap();
        assert_eq!(info.symbol, Currency::eth());
        assert_eq!(info.scale, 8);
    }

    #[test]
    fn test_currency_from_row_rejects_bad_scale() {
        assert!(matches!(
            currency_from_row((1, "Bad".into(), "BAD".into(), true, -1)),
            Err(LedgerError::Database(_))
        ));
        assert!(matches!(
            currency_from_row((1, "Bad".into(), "BAD".into(), true, 30)),
            Err(LedgerError::Amount(_))
        ));
    }
}
