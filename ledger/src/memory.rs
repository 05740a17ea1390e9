//! In-memory balance store.
//!
//! Used for tests and local runs without a database. One mutex guards the
//! whole map, so an exchange observes and writes both legs atomically.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use cryptoswap_common::{Currency, CurrencyInfo, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{BalanceStore, ExchangeLegs, ExchangeReceipt, Holding, UserRegistry};

#[derive(Default)]
struct Inner {
    currencies: HashMap<Currency, CurrencyInfo>,
    users: HashSet<UserId>,
    balances: HashMap<(UserId, Currency), i64>,
}

impl Inner {
    fn currency(&self, symbol: &Currency) -> LedgerResult<&CurrencyInfo> {
        self.currencies
            .get(symbol)
            .ok_or_else(|| LedgerError::CurrencyNotFound(symbol.clone()))
    }

    fn balance(&self, user: UserId, symbol: &Currency) -> i64 {
        self.balances
            .get(&(user, symbol.clone()))
            .copied()
            .unwrap_or(0)
    }
}

/// In-memory store for testing.
#[derive(Default)]
pub struct MemoryBalanceStore {
    inner: Mutex<Inner>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a currency.
    pub fn add_currency(&self, info: CurrencyInfo) {
        self.inner.lock().currencies.insert(info.symbol.clone(), info);
    }

    /// Register a user.
    pub fn add_user(&self, user: UserId) {
        self.inner.lock().users.insert(user);
    }

    /// Toggle whether a currency can be exchanged.
    pub fn set_available(&self, symbol: &Currency, available: bool) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let info = inner
            .currencies
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::CurrencyNotFound(symbol.clone()))?;
        info.available = available;
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for MemoryBalanceStore {
    async fn user_exists(&self, user: UserId) -> LedgerResult<bool> {
        Ok(self.inner.lock().users.contains(&user))
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn currency_info(&self, symbol: &Currency) -> LedgerResult<CurrencyInfo> {
        self.inner.lock().currency(symbol).cloned()
    }

    async fn get_balance(&self, user: UserId, symbol: &Currency) -> LedgerResult<i64> {
        let inner = self.inner.lock();
        inner.currency(symbol)?;
        Ok(inner.balance(user, symbol))
    }

    async fn list_balances(&self, user: UserId) -> LedgerResult<Vec<Holding>> {
        let inner = self.inner.lock();
        let mut holdings = Vec::new();
        for ((owner, symbol), balance) in &inner.balances {
            if *owner != user {
                continue;
            }
            holdings.push(Holding {
                currency: inner.currency(symbol)?.clone(),
                balance: *balance,
            });
        }
        holdings.sort_by(|a, b| a.currency.symbol.cmp(&b.currency.symbol));
        Ok(holdings)
    }

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

        let mut inner = self.inner.lock();
        inner.currency(symbol)?;
        if !inner.users.contains(&user) {
            return Err(LedgerError::UserNotFound(user));
        }
        inner.balances.insert((user, symbol.clone()), new_balance);
        Ok(())
    }

    async fn apply_exchange(
        &self,
        user: UserId,
        legs: &ExchangeLegs,
    ) -> LedgerResult<ExchangeReceipt> {
        legs.validate()?;

        let mut inner = self.inner.lock();
        let source = inner.currency(&legs.source)?.clone();
        let target = inner.currency(&legs.target)?.clone();
        if !inner.users.contains(&user) {
            return Err(LedgerError::UserNotFound(user));
        }

        let source_before = inner.balance(user, &legs.source);
        let target_before = inner.balance(user, &legs.target);
        let (source_after, target_after) = legs.settle(&source, source_before, target_before)?;
        let receipt = ExchangeReceipt::new(
            user,
            &source,
            &target,
            (source_before, source_after),
            (target_before, target_after),
        )?;

        inner
            .balances
            .insert((user, legs.source.clone()), source_after);
        inner
            .balances
            .insert((user, legs.target.clone()), target_after);

        debug!(
            user_id = %user,
            source = %legs.source,
            target = %legs.target,
            debit = legs.debit,
            credit = legs.credit,
            "Exchange applied"
        );

        Ok(receipt)
    }
}
