//! HTTP API for the wallet service.
//!
//! Provides REST endpoints for:
//! - Health check and Prometheus metrics
//! - Single and full balance listings valued in USD
//! - Exchange preview (quote) and apply (finalize)
//!
//! The caller is identified by the `userId` header, which is trusted.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use cryptoswap_common::{Currency, ErrorClass, ExchangeError, Timestamp, UserId};

use crate::engine::{ExchangeEngine, Valuation};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub engine: Arc<ExchangeEngine>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub crypto: String,
}

/// One currency balance with its USD value.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub crypto: String,
    pub crypto_balance: Decimal,
    pub usd_balance: Decimal,
}

/// Entry of the full balance listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub crypto: String,
    pub crypto_name: String,
    pub crypto_balance: Decimal,
    pub usd_balance: Decimal,
}

impl From<Valuation> for BalanceEntry {
    fn from(v: Valuation) -> Self {
        Self {
            crypto: v.currency.to_string(),
            crypto_name: v.name,
            crypto_balance: v.balance,
            usd_balance: v.usd_value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQuery {
    pub source: String,
    pub target: String,
    pub source_amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub source_amount: Decimal,
    pub converted_amount: Decimal,
    pub rate: Decimal,
    pub token: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub message: String,
    pub source_balance: Decimal,
    pub target_balance: Decimal,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error carrying the status it maps to.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.to_string(),
            },
        }
    }

    fn bad_request(code: &str, error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, error)
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        let status = match err.class() {
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::Conflict => StatusCode::CONFLICT,
            ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                code: err.error_code().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Caller identity taken from the `userId` header.
pub struct CallerId(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("userId")
            .ok_or_else(|| ApiError::bad_request("INVALID_USER_ID", "missing userId header"))?;
        let user = value
            .to_str()
            .ok()
            .and_then(|v| UserId::from_str(v).ok())
            .ok_or_else(|| ApiError::bad_request("INVALID_USER_ID", "invalid userId header"))?;
        Ok(CallerId(user))
    }
}

/// Query string extractor that rejects with an [`ApiError`] body.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request("INVALID_REQUEST", rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// JSON body extractor that rejects with an [`ApiError`] body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ApiError::new(rejection.status(), "INVALID_REQUEST", rejection.body_text())
        })?;
        Ok(ApiJson(value))
    }
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/balance", get(balance_handler))
        .route("/balances", get(balances_handler))
        .route("/exchange/preview", get(preview_handler))
        .route("/exchange/apply", post(apply_handler))
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn metrics_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.engine.metrics().to_prometheus(),
    )
}

async fn balance_handler(
    State(state): State<Arc<ApiState>>,
    CallerId(user): CallerId,
    ApiQuery(query): ApiQuery<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let valuation = state
        .engine
        .balance_with_usd(user, &Currency::new(&query.crypto))
        .await?;

    Ok(Json(BalanceResponse {
        crypto: valuation.currency.to_string(),
        crypto_balance: valuation.balance,
        usd_balance: valuation.usd_value,
    }))
}

async fn balances_handler(
    State(state): State<Arc<ApiState>>,
    CallerId(user): CallerId,
) -> Result<Json<Vec<BalanceEntry>>, ApiError> {
    let valuations = state.engine.balances_with_usd(user).await?;
    Ok(Json(valuations.into_iter().map(BalanceEntry::from).collect()))
}

async fn preview_handler(
    State(state): State<Arc<ApiState>>,
    CallerId(user): CallerId,
    ApiQuery(query): ApiQuery<PreviewQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let source_amount = Decimal::from_str(query.source_amount.trim())
        .map_err(|_| ApiError::from(ExchangeError::InvalidAmount(format!(
            "sourceAmount {:?} is not a decimal number",
            query.source_amount
        ))))?;

    let quote = state
        .engine
        .quote(
            user,
            &Currency::new(&query.source),
            &Currency::new(&query.target),
            source_amount,
        )
        .await?;

    Ok(Json(PreviewResponse {
        source_amount: quote.source_amount,
        converted_amount: quote.target_amount,
        rate: quote.rate,
        token: quote.token,
        expires_at: quote.expires_at,
    }))
}

async fn apply_handler(
    State(state): State<Arc<ApiState>>,
    CallerId(user): CallerId,
    ApiJson(request): ApiJson<ApplyRequest>,
) -> Result<Json<ApplyResponse>, ApiError> {
    let receipt = state.engine.finalize(user, &request.token).await?;

    Ok(Json(ApplyResponse {
        message: "Exchange finalized successfully".to_string(),
        source_balance: receipt.source.amount_after,
        target_balance: receipt.target.amount_after,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::guard::MemoryRedemptionGuard;
    use crate::metrics::Metrics;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use cryptoswap_common::{CurrencyInfo, CurrencyPair};
    use cryptoswap_crypto::{IntentTokenCodec, SigningSecret};
    use cryptoswap_fx::{MockRateProvider, PriceOracle};
    use cryptoswap_ledger::{
        BalanceStore, ExchangeLegs, ExchangeReceipt, Holding, LedgerError, LedgerResult,
        MemoryBalanceStore, UserRegistry,
    };
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    async fn seeded_store() -> MemoryBalanceStore {
        let store = MemoryBalanceStore::new();
        store.add_currency(CurrencyInfo::new(1, Currency::btc(), "Bitcoin", 2, true).unwrap());
        store.add_currency(CurrencyInfo::new(2, Currency::eth(), "Ethereum", 2, true).unwrap());
        store.add_user(UserId::new(1));
        store
            .apply_delta(UserId::new(1), &Currency::btc(), 10000)
            .await
            .unwrap();
        store
    }

    async fn app() -> Router {
        router(Arc::new(seeded_store().await))
    }

    fn router(store: Arc<dyn BalanceStore>) -> Router {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_rate(CurrencyPair::new(Currency::btc(), Currency::eth()), dec!(2));
        provider.set_rate(CurrencyPair::new(Currency::btc(), Currency::usd()), dec!(10));
        provider.set_rate(CurrencyPair::new(Currency::eth(), Currency::usd()), dec!(5));

        let engine = ExchangeEngine::new(
            store,
            Arc::new(PriceOracle::new(provider)),
            IntentTokenCodec::new(SigningSecret::from_bytes(b"api-test-secret-0123456").unwrap()),
            Arc::new(MemoryRedemptionGuard::new()),
            Arc::new(Metrics::new()),
            EngineConfig::default(),
        );

        create_router(Arc::new(ApiState {
            engine: Arc::new(engine),
        }))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("userId", "1")
            .body(Body::empty())
            .unwrap()
    }

    fn apply(token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/exchange/apply")
            .header("userId", "1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "token": token }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_balance() {
        let app = app().await;
        let (status, body) = send(&app, get("/balance?crypto=btc")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crypto"], "BTC");
        assert_eq!(body["cryptoBalance"], "100.00");
        assert_eq!(body["usdBalance"], "1000.00");
    }

    #[tokio::test]
    async fn test_missing_user_header() {
        let app = app().await;
        let request = Request::builder()
            .uri("/balances")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_USER_ID");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let app = app().await;
        let request = Request::builder()
            .uri("/balances")
            .header("userId", "77")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_preview_apply_replay() {
        let app = app().await;

        let (status, preview) = send(
            &app,
            get("/exchange/preview?source=BTC&target=ETH&sourceAmount=40.00"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["convertedAmount"], "80.00");
        let token = preview["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, apply(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sourceBalance"], "60.00");
        assert_eq!(body["targetBalance"], "80.00");

        let (status, body) = send(&app, apply(&token)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "TOKEN_INVALID_OR_EXPIRED");

        let (status, balances) = send(&app, get("/balances")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(balances.as_array().unwrap().len(), 2);
        assert_eq!(balances[1]["cryptoName"], "Ethereum");
    }

    #[tokio::test]
    async fn test_preview_rejects_bad_amount() {
        let app = app().await;
        let (status, body) = send(
            &app,
            get("/exchange/preview?source=BTC&target=ETH&sourceAmount=lots"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = app().await;
        send(&app, get("/exchange/preview?source=BTC&target=ETH&sourceAmount=1")).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("cryptoswap_quotes_issued 1"));
    }

    /// Store whose lookups start failing once an exchange has been applied.
    struct FailsAfterExchange {
        inner: MemoryBalanceStore,
        applied: AtomicBool,
    }

    #[async_trait]
    impl UserRegistry for FailsAfterExchange {
        async fn user_exists(&self, user: UserId) -> LedgerResult<bool> {
            self.inner.user_exists(user).await
        }
    }

    #[async_trait]
    impl BalanceStore for FailsAfterExchange {
        async fn currency_info(&self, symbol: &Currency) -> LedgerResult<CurrencyInfo> {
            if self.applied.load(Ordering::SeqCst) {
                return Err(LedgerError::Database("connection reset".to_string()));
            }
            self.inner.currency_info(symbol).await
        }

        async fn get_balance(&self, user: UserId, symbol: &Currency) -> LedgerResult<i64> {
            self.inner.get_balance(user, symbol).await
        }

        async fn list_balances(&self, user: UserId) -> LedgerResult<Vec<Holding>> {
            self.inner.list_balances(user).await
        }

        async fn apply_delta(
            &self,
            user: UserId,
            symbol: &Currency,
            new_balance: i64,
        ) -> LedgerResult<()> {
            self.inner.apply_delta(user, symbol, new_balance).await
        }

        async fn apply_exchange(
            &self,
            user: UserId,
            legs: &ExchangeLegs,
        ) -> LedgerResult<ExchangeReceipt> {
            let receipt = self.inner.apply_exchange(user, legs).await?;
            self.applied.store(true, Ordering::SeqCst);
            Ok(receipt)
        }
    }

    #[tokio::test]
    async fn test_apply_reports_success_once_committed() {
        let store = Arc::new(FailsAfterExchange {
            inner: seeded_store().await,
            applied: AtomicBool::new(false),
        });
        let app = router(store.clone());

        let (_, preview) = send(
            &app,
            get("/exchange/preview?source=BTC&target=ETH&sourceAmount=40.00"),
        )
        .await;
        let token = preview["token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, apply(&token)).await;
        assert_eq!(status, StatusCode::OK, "body: {}", body);
        assert_eq!(body["sourceBalance"], "60.00");
        assert_eq!(body["targetBalance"], "80.00");

        let btc = store.inner.get_balance(UserId::new(1), &Currency::btc()).await.unwrap();
        let eth = store.inner.get_balance(UserId::new(1), &Currency::eth()).await.unwrap();
        assert_eq!((btc, eth), (6000, 8000));
    }

    #[tokio::test]
    async fn test_missing_query_parameter_is_json_error() {
        let app = app().await;
        let (status, body) = send(&app, get("/balance")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
        assert!(body["error"].as_str().unwrap().contains("crypto"));
    }

    #[tokio::test]
    async fn test_bad_apply_body_is_json_error() {
        let app = app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/exchange/apply")
            .header("userId", "1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"tok": "x"}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INVALID_REQUEST");

        let request = Request::builder()
            .method("POST")
            .uri("/exchange/apply")
            .header("userId", "1")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_REQUEST");
    }
}
