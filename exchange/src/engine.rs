//! Two-phase exchange: price a quote, then redeem its token exactly once.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use cryptoswap_common::{
    constants, now, Currency, CurrencyInfo, DurationExt, ExchangeError, Result, Timestamp, UserId,
};
use cryptoswap_crypto::{fingerprint, IntentClaims, IntentTokenCodec};
use cryptoswap_fx::PriceOracle;
use cryptoswap_ledger::{BalanceStore, ExchangeLegs, ExchangeReceipt};

use crate::guard::RedemptionGuard;
use crate::metrics::SharedMetrics;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long an issued quote can be redeemed.
    pub quote_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_ttl: constants::quote_validity().as_std(),
        }
    }
}

/// A priced, signed offer to exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub source_currency: Currency,
    pub target_currency: Currency,
    pub source_amount: Decimal,
    pub target_amount: Decimal,
    pub rate: Decimal,
    pub token: String,
    pub expires_at: Timestamp,
}

/// A balance together with its value in the reference currency.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub currency: Currency,
    pub name: String,
    pub balance: Decimal,
    pub usd_value: Decimal,
}

/// Orchestrates quotes and their redemption against the balance store.
pub struct ExchangeEngine {
    store: Arc<dyn BalanceStore>,
    oracle: Arc<PriceOracle>,
    codec: IntentTokenCodec,
    guard: Arc<dyn RedemptionGuard>,
    metrics: SharedMetrics,
    config: EngineConfig,
}

impl ExchangeEngine {
    pub fn new(
        store: Arc<dyn BalanceStore>,
        oracle: Arc<PriceOracle>,
        codec: IntentTokenCodec,
        guard: Arc<dyn RedemptionGuard>,
        metrics: SharedMetrics,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            codec,
            guard,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Price `source_amount` of `source` in `target` and mint a redeemable
    /// token for it. Balances are not checked or touched.
    #[instrument(skip(self), fields(user_id = %user, source = %source, target = %target))]
    pub async fn quote(
        &self,
        user: UserId,
        source: &Currency,
        target: &Currency,
        source_amount: Decimal,
    ) -> Result<Quote> {
        let result = self.issue_quote(user, source, target, source_amount).await;
        match &result {
            Ok(quote) => {
                self.metrics.quote_issued();
                info!(
                    source_amount = %quote.source_amount,
                    target_amount = %quote.target_amount,
                    rate = %quote.rate,
                    token = %fingerprint(&quote.token),
                    "Quote issued"
                );
            }
            Err(e) => {
                self.metrics.quote_failed();
                warn!(error = %e, code = e.error_code(), "Quote rejected");
            }
        }
        result
    }

    async fn issue_quote(
        &self,
        user: UserId,
        source: &Currency,
        target: &Currency,
        source_amount: Decimal,
    ) -> Result<Quote> {
        self.ensure_user(user).await?;

        if source_amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(format!(
                "source amount must be positive, got {}",
                source_amount
            )));
        }
        if source == target {
            return Err(ExchangeError::InvalidAmount(format!(
                "cannot exchange {} for itself",
                source
            )));
        }

        let source_info = self.tradable_currency(source).await?;
        let target_info = self.tradable_currency(target).await?;

        let source_amount = source_info.truncate(source_amount);
        if source_amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(format!(
                "source amount is below the smallest unit of {}",
                source
            )));
        }
        // Must be storable before anything is signed.
        source_info.to_fixed_point(source_amount)?;

        let rate = self.oracle.rate(source, target).await?.rate;
        let converted = source_amount.checked_mul(rate).ok_or_else(|| {
            ExchangeError::InvalidAmount(format!("{} {} overflows at rate {}", source_amount, source, rate))
        })?;
        let target_amount = target_info.truncate(converted);
        if target_amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(format!(
                "{} {} is worth less than the smallest unit of {}",
                source_amount, source, target
            )));
        }
        target_info.to_fixed_point(target_amount)?;

        let ttl = self.config.quote_ttl;
        let issued_at = now();
        let validity = chrono::Duration::from_std(ttl)
            .map_err(|e| ExchangeError::QuoteUnavailable(format!("quote ttl: {}", e)))?;
        let claims = IntentClaims::new(
            source.clone(),
            target.clone(),
            source_amount,
            target_amount,
            issued_at,
            validity,
        );
        let expires_at = claims
            .expiry()
            .ok_or_else(|| ExchangeError::QuoteUnavailable("quote expiry out of range".to_string()))?;
        let token = self.codec.encode(&claims)?;
        self.guard.register(&token, ttl).await?;

        Ok(Quote {
            source_currency: source.clone(),
            target_currency: target.clone(),
            source_amount,
            target_amount,
            rate,
            token,
            expires_at,
        })
    }

    /// Redeem a token: debit the quoted source amount and credit the quoted
    /// target amount. A token is accepted at most once.
    ///
    /// The receipt carries the decimal post-trade balances; nothing that can
    /// fail runs once the store has applied the exchange.
    #[instrument(skip(self, token), fields(user_id = %user, token = %fingerprint(token)))]
    pub async fn finalize(&self, user: UserId, token: &str) -> Result<ExchangeReceipt> {
        match self.redeem(user, token).await {
            Ok(receipt) => {
                self.metrics.exchange_finalized();
                info!(
                    source = %receipt.source.currency,
                    source_after = receipt.source.balance_after,
                    target = %receipt.target.currency,
                    target_after = receipt.target.balance_after,
                    "Exchange finalized"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.metrics.exchange_rejected();
                warn!(error = %e, code = e.error_code(), "Finalize rejected");
                Err(e)
            }
        }
    }

    async fn redeem(&self, user: UserId, token: &str) -> Result<ExchangeReceipt> {
        self.ensure_user(user).await?;

        if !self.guard.consume_if_present(token).await? {
            self.metrics.replay_rejected();
            return Err(ExchangeError::TokenInvalidOrExpired);
        }

        let claims = self.codec.decode(token)?;

        let source_info = self.store.currency_info(&claims.source_currency).await?;
        let target_info = self.store.currency_info(&claims.target_currency).await?;
        let debit = source_info.to_fixed_point(claims.source_amount)?;
        let credit = target_info.to_fixed_point(claims.target_amount)?;

        let current = self.store.get_balance(user, &source_info.symbol).await?;
        if current < debit {
            return Err(ExchangeError::InsufficientBalance {
                required: claims.source_amount.to_string(),
                available: source_info.to_decimal(current)?.to_string(),
            });
        }

        let legs = ExchangeLegs {
            source: source_info.symbol,
            target: target_info.symbol,
            debit,
            credit,
        };
        Ok(self.store.apply_exchange(user, &legs).await?)
    }

    /// Decimal balance of one currency and its USD value.
    #[instrument(skip(self), fields(user_id = %user, currency = %symbol))]
    pub async fn balance_with_usd(&self, user: UserId, symbol: &Currency) -> Result<Valuation> {
        self.ensure_user(user).await?;
        let info = self.store.currency_info(symbol).await?;
        let raw = self.store.get_balance(user, symbol).await?;
        self.value(info, raw).await
    }

    /// Every balance the user holds, valued in USD.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn balances_with_usd(&self, user: UserId) -> Result<Vec<Valuation>> {
        self.ensure_user(user).await?;
        let holdings = self.store.list_balances(user).await?;

        let mut valuations = Vec::with_capacity(holdings.len());
        for holding in holdings {
            valuations.push(self.value(holding.currency, holding.balance).await?);
        }
        Ok(valuations)
    }

    async fn value(&self, info: CurrencyInfo, raw: i64) -> Result<Valuation> {
        let balance = info.to_decimal(raw)?;
        let rate = self
            .oracle
            .rate(&info.symbol, self.oracle.reference_currency())
            .await?
            .rate;
        let usd_value = balance.checked_mul(rate).ok_or_else(|| {
            ExchangeError::InvalidAmount(format!("{} {} overflows in USD", balance, info.symbol))
        })?;

        Ok(Valuation {
            currency: info.symbol,
            name: info.name,
            balance,
            usd_value,
        })
    }

    async fn ensure_user(&self, user: UserId) -> Result<()> {
        if self.store.user_exists(user).await? {
            Ok(())
        } else {
            Err(ExchangeError::UserNotFound(user))
        }
    }

    async fn tradable_currency(&self, symbol: &Currency) -> Result<CurrencyInfo> {
        let info = self.store.currency_info(symbol).await?;
        if !info.available {
            return Err(ExchangeError::CurrencyUnavailable(symbol.clone()));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::MemoryRedemptionGuard;
    use crate::metrics::Metrics;
    use cryptoswap_common::CurrencyPair;
    use cryptoswap_crypto::SigningSecret;
    use cryptoswap_fx::{FxError, MockRateProvider};
    use cryptoswap_ledger::MemoryBalanceStore;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &[u8] = b"engine-test-secret-0123";

    struct Harness {
        engine: Arc<ExchangeEngine>,
        store: Arc<MemoryBalanceStore>,
        provider: Arc<MockRateProvider>,
        guard: Arc<MemoryRedemptionGuard>,
    }

    fn user() -> UserId {
        UserId::new(1)
    }

    fn aaa() -> Currency {
        Currency::new("AAA")
    }

    fn bbb() -> Currency {
        Currency::new("BBB")
    }

    fn pair(base: &Currency, quote: &Currency) -> CurrencyPair {
        CurrencyPair::new(base.clone(), quote.clone())
    }

    fn harness_with_ttl(ttl: Duration) -> Harness {
        let store = Arc::new(MemoryBalanceStore::new());
        store.add_currency(CurrencyInfo::new(1, aaa(), "Alpha", 2, true).unwrap());
        store.add_currency(CurrencyInfo::new(2, bbb(), "Beta", 2, true).unwrap());
        store.add_currency(CurrencyInfo::new(3, Currency::btc(), "Bitcoin", 8, true).unwrap());
        store.add_currency(CurrencyInfo::new(4, Currency::new("OFF"), "Offline", 2, false).unwrap());
        store.add_user(user());

        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_rate(pair(&aaa(), &bbb()), dec!(2.0));
        provider.set_rate(pair(&aaa(), &Currency::usd()), dec!(1.5));
        provider.set_rate(pair(&bbb(), &Currency::usd()), dec!(0.75));
        provider.set_rate(pair(&Currency::btc(), &aaa()), dec!(3));

        let guard = Arc::new(MemoryRedemptionGuard::new());
        let codec = IntentTokenCodec::new(SigningSecret::from_bytes(SECRET).unwrap());
        let engine = Arc::new(ExchangeEngine::new(
            store.clone(),
            Arc::new(PriceOracle::new(provider.clone())),
            codec,
            guard.clone(),
            Arc::new(Metrics::new()),
            EngineConfig { quote_ttl: ttl },
        ));

        Harness {
            engine,
            store,
            provider,
            guard,
        }
    }

    async fn harness() -> Harness {
        let h = harness_with_ttl(Duration::from_secs(60));
        h.store.apply_delta(user(), &aaa(), 10000).await.unwrap();
        h.store.apply_delta(user(), &bbb(), 0).await.unwrap();
        h
    }

    async fn balance(h: &Harness, symbol: &Currency) -> i64 {
        h.store.get_balance(user(), symbol).await.unwrap()
    }

    #[tokio::test]
    async fn test_quote_then_finalize_then_replay() {
        let h = harness().await;

        let quote = h
            .engine
            .quote(user(), &aaa(), &bbb(), dec!(40.00))
            .await
            .unwrap();
        assert_eq!(quote.target_amount, dec!(80.00));
        assert_eq!(h.guard.len(), 1);
        // quoting never moves money
        assert_eq!(balance(&h, &aaa()).await, 10000);

        let receipt = h.engine.finalize(user(), &quote.token).await.unwrap();
        assert_eq!(receipt.source.balance_before, 10000);
        assert_eq!(receipt.source.balance_after, 6000);
        assert_eq!(receipt.target.balance_after, 8000);
        assert_eq!(receipt.source.amount_after, dec!(60.00));
        assert_eq!(receipt.target.amount_after, dec!(80.00));
        assert_eq!(balance(&h, &aaa()).await, 6000);
        assert_eq!(balance(&h, &bbb()).await, 8000);

        let replay = h.engine.finalize(user(), &quote.token).await;
        assert!(matches!(replay, Err(ExchangeError::TokenInvalidOrExpired)));
        assert_eq!(balance(&h, &aaa()).await, 6000);
        assert_eq!(balance(&h, &bbb()).await, 8000);

        let snapshot = h.engine.metrics().snapshot();
        assert_eq!(snapshot.quotes_issued, 1);
        assert_eq!(snapshot.exchanges_finalized, 1);
        assert_eq!(snapshot.replays_rejected, 1);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_applies_once() {
        let h = harness().await;
        let quote = h
            .engine
            .quote(user(), &aaa(), &bbb(), dec!(40.00))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = h.engine.clone();
            let token = quote.token.clone();
            handles.push(tokio::spawn(async move {
                engine.finalize(user(), &token).await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => applied += 1,
                Err(e) => assert!(matches!(e, ExchangeError::TokenInvalidOrExpired)),
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(balance(&h, &aaa()).await, 6000);
        assert_eq!(balance(&h, &bbb()).await, 8000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_half_applied_exchange() {
        let h = harness().await;

        let mut tokens = Vec::new();
        for _ in 0..8 {
            let quote = h.engine.quote(user(), &aaa(), &bbb(), dec!(10.00)).await.unwrap();
            tokens.push(quote.token);
        }

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let store = h.store.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut observed = 0usize;
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    let holdings = store.list_balances(user()).await.unwrap();
                    let raw = |symbol: &Currency| {
                        holdings
                            .iter()
                            .find(|holding| &holding.currency.symbol == symbol)
                            .map(|holding| holding.balance)
                            .unwrap_or(0)
                    };
                    let (source, target) = (raw(&aaa()), raw(&bbb()));

                    // Every trade moves 1000 out of AAA and 2000 into BBB.
                    let spent = 10000 - source;
                    assert_eq!(spent % 1000, 0, "partial debit observed: {}", source);
                    assert_eq!(
                        target,
                        spent / 1000 * 2000,
                        "legs out of step: {} / {}",
                        source,
                        target
                    );
                    observed += 1;

                    if finished {
                        return observed;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut handles = Vec::new();
        for token in tokens {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                engine.finalize(user(), &token).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        done.store(true, Ordering::SeqCst);

        assert!(reader.await.unwrap() > 0);
        assert_eq!(balance(&h, &aaa()).await, 2000);
        assert_eq!(balance(&h, &bbb()).await, 16000);
    }

    #[tokio::test]
    async fn test_identical_quotes_are_independent() {
        let h = harness().await;

        let first = h.engine.quote(user(), &aaa(), &bbb(), dec!(10)).await.unwrap();
        let second = h.engine.quote(user(), &aaa(), &bbb(), dec!(10)).await.unwrap();
        assert_ne!(first.token, second.token);

        h.engine.finalize(user(), &first.token).await.unwrap();
        h.engine.finalize(user(), &second.token).await.unwrap();
        assert_eq!(balance(&h, &aaa()).await, 8000);
        assert_eq!(balance(&h, &bbb()).await, 4000);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_even_with_record() {
        let h = harness_with_ttl(Duration::from_secs(1));
        h.store.apply_delta(user(), &aaa(), 10000).await.unwrap();

        let quote = h
            .engine
            .quote(user(), &aaa(), &bbb(), dec!(1.00))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;

        // Put a live record back so only the token's own expiry can reject it.
        h.guard
            .register(&quote.token, Duration::from_secs(60))
            .await
            .unwrap();

        let result = h.engine.finalize(user(), &quote.token).await;
        assert!(matches!(result, Err(ExchangeError::TokenInvalidOrExpired)));
        assert_eq!(balance(&h, &aaa()).await, 10000);
    }

    #[tokio::test]
    async fn test_forged_token_rejected() {
        let h = harness().await;
        let forger = IntentTokenCodec::new(SigningSecret::from_bytes(b"not-the-service-secret").unwrap());
        let claims = IntentClaims::new(
            aaa(),
            bbb(),
            dec!(1),
            dec!(1000),
            now(),
            chrono::Duration::seconds(60),
        );
        let token = forger.encode(&claims).unwrap();
        h.guard.register(&token, Duration::from_secs(60)).await.unwrap();

        let result = h.engine.finalize(user(), &token).await;
        assert!(matches!(result, Err(ExchangeError::TokenInvalidOrExpired)));
        assert_eq!(balance(&h, &bbb()).await, 0);
    }

    #[tokio::test]
    async fn test_balance_drop_between_quote_and_finalize() {
        let h = harness().await;
        let quote = h
            .engine
            .quote(user(), &aaa(), &bbb(), dec!(40.00))
            .await
            .unwrap();

        h.store.apply_delta(user(), &aaa(), 3999).await.unwrap();

        match h.engine.finalize(user(), &quote.token).await {
            Err(ExchangeError::InsufficientBalance {
                required,
                available,
            }) => {
                assert_eq!(required, "40.00");
                assert_eq!(available, "39.99");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(balance(&h, &aaa()).await, 3999);
        assert_eq!(balance(&h, &bbb()).await, 0);

        // the token was spent by the failed attempt
        h.store.apply_delta(user(), &aaa(), 10000).await.unwrap();
        assert!(matches!(
            h.engine.finalize(user(), &quote.token).await,
            Err(ExchangeError::TokenInvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn test_quote_does_not_check_balance() {
        let h = harness().await;
        let quote = h.engine.quote(user(), &aaa(), &bbb(), dec!(1000000)).await;
        assert!(quote.is_ok());
    }

    #[tokio::test]
    async fn test_quote_truncates_to_scales() {
        let h = harness().await;

        // BTC carries eight decimals, AAA two
        let quote = h
            .engine
            .quote(user(), &Currency::btc(), &aaa(), dec!(0.123456789))
            .await
            .unwrap();
        assert_eq!(quote.source_amount, dec!(0.12345678));
        assert_eq!(quote.target_amount, dec!(0.37));
    }

    #[tokio::test]
    async fn test_quote_rejects_worthless_target() {
        let h = harness().await;
        h.provider.set_rate(pair(&aaa(), &Currency::btc()), dec!(0.0000001));

        // 0.05 * 0.0000001 truncates to zero at eight decimals
        let result = h
            .engine
            .quote(user(), &aaa(), &Currency::btc(), dec!(0.05))
            .await;

        assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
        assert!(h.guard.is_empty());
        assert_eq!(balance(&h, &aaa()).await, 10000);
    }

    #[tokio::test]
    async fn test_quote_expiry_matches_token() {
        let h = harness().await;
        let quote = h.engine.quote(user(), &aaa(), &bbb(), dec!(1)).await.unwrap();
        let claims = h.engine.codec.decode(&quote.token).unwrap();

        assert_eq!(quote.expires_at.timestamp(), claims.expires_at);
        assert_eq!(quote.expires_at.timestamp_subsec_nanos(), 0);
    }

    #[tokio::test]
    async fn test_quote_through_usd_cross_rate() {
        let h = harness().await;
        h.provider.set_untradeable(pair(&aaa(), &bbb()));

        // 1.5 USD per AAA over 0.75 USD per BBB
        let quote = h.engine.quote(user(), &aaa(), &bbb(), dec!(40.00)).await.unwrap();
        assert_eq!(quote.rate, dec!(2));
        assert_eq!(quote.target_amount, dec!(80.00));

        h.engine.finalize(user(), &quote.token).await.unwrap();
        assert_eq!(balance(&h, &bbb()).await, 8000);
    }

    #[tokio::test]
    async fn test_disabled_currency_cannot_be_quoted() {
        let h = harness().await;
        h.store.set_available(&bbb(), false).unwrap();

        let result = h.engine.quote(user(), &aaa(), &bbb(), dec!(1)).await;
        assert!(matches!(result, Err(ExchangeError::CurrencyUnavailable(_))));

        h.store.set_available(&bbb(), true).unwrap();
        assert!(h.engine.quote(user(), &aaa(), &bbb(), dec!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_quote_below_smallest_unit() {
        let h = harness().await;
        let result = h.engine.quote(user(), &aaa(), &bbb(), dec!(0.001)).await;
        assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_quote_validation() {
        let h = harness().await;

        assert!(matches!(
            h.engine.quote(user(), &aaa(), &bbb(), dec!(0)).await,
            Err(ExchangeError::InvalidAmount(_))
        ));
        assert!(matches!(
            h.engine.quote(user(), &aaa(), &bbb(), dec!(-5)).await,
            Err(ExchangeError::InvalidAmount(_))
        ));
        assert!(matches!(
            h.engine.quote(user(), &aaa(), &aaa(), dec!(5)).await,
            Err(ExchangeError::InvalidAmount(_))
        ));
        assert!(matches!(
            h.engine.quote(user(), &aaa(), &Currency::new("XYZ"), dec!(5)).await,
            Err(ExchangeError::CurrencyNotFound(_))
        ));
        assert!(matches!(
            h.engine.quote(user(), &Currency::new("OFF"), &aaa(), dec!(5)).await,
            Err(ExchangeError::CurrencyUnavailable(_))
        ));
        assert!(matches!(
            h.engine.quote(UserId::new(42), &aaa(), &bbb(), dec!(5)).await,
            Err(ExchangeError::UserNotFound(_))
        ));

        assert!(h.guard.is_empty());
        assert_eq!(h.engine.metrics().snapshot().quotes_failed, 6);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_quote_unavailable() {
        let h = harness().await;
        h.provider.set_failure(
            pair(&aaa(), &bbb()),
            FxError::Timeout(pair(&aaa(), &bbb())),
        );

        let result = h.engine.quote(user(), &aaa(), &bbb(), dec!(5)).await;

        assert!(matches!(result, Err(ExchangeError::QuoteUnavailable(_))));
        assert!(h.guard.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_does_not_consume_token() {
        let h = harness().await;
        let quote = h.engine.quote(user(), &aaa(), &bbb(), dec!(1)).await.unwrap();

        let result = h.engine.finalize(UserId::new(42), &quote.token).await;
        assert!(matches!(result, Err(ExchangeError::UserNotFound(_))));

        assert!(h.engine.finalize(user(), &quote.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_balances_with_usd() {
        let h = harness().await;

        let single = h.engine.balance_with_usd(user(), &aaa()).await.unwrap();
        assert_eq!(single.balance, dec!(100.00));
        assert_eq!(single.usd_value, dec!(150.00));

        let all = h.engine.balances_with_usd(user()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].currency, aaa());
        assert_eq!(all[1].currency, bbb());
        assert_eq!(all[1].usd_value, Decimal::ZERO);

        assert!(matches!(
            h.engine.balance_with_usd(user(), &Currency::new("XYZ")).await,
            Err(ExchangeError::CurrencyNotFound(_))
        ));
    }
}
