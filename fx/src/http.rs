//! HTTP rate provider for CryptoCompare-style price endpoints.
//!
//! The endpoint is a URL template with `{base}` and `{quote}` placeholders.
//! A successful body carries the price at `RAW.PRICE`; a body with a string
//! `Response` field means the service does not quote that pair.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use cryptoswap_common::{constants, CurrencyPair, DurationExt, FxRate};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;

/// Default CryptoCompare aggregate price endpoint.
pub const DEFAULT_PRICE_URL: &str =
    "https://min-api.cryptocompare.com/data/generateAvg?fsym={base}&tsym={quote}&e=CCCAGG";

/// Configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// URL template with `{base}` and `{quote}` placeholders.
    pub url_template: String,
    /// Bound on the whole request, body included.
    pub timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_PRICE_URL.to_string(),
            timeout: constants::oracle_timeout().as_std(),
        }
    }
}

/// Rate provider backed by an HTTP price service.
pub struct HttpRateProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpRateProvider {
    /// Create a new HTTP provider.
    pub fn new(config: HttpProviderConfig) -> FxResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| FxError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Substitute the pair into the URL template.
    pub fn format_url(&self, pair: &CurrencyPair) -> String {
        self.config
            .url_template
            .replace("{base}", pair.base.code())
            .replace("{quote}", pair.quote.code())
    }

    async fn fetch_body(&self, url: &str) -> Result<String, FxError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FxError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Transport(format!(
                "unexpected status code from price service: {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| FxError::Transport(e.to_string()))
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<FxRate> {
        let url = self.format_url(pair);
        debug!(pair = %pair, "Requesting price");

        let body = timeout(self.config.timeout, self.fetch_body(&url))
            .await
            .map_err(|_| FxError::Timeout(pair.clone()))??;

        let price = parse_price_response(&body, pair)?;
        Ok(FxRate::new(pair.clone(), price, self.name()))
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(rename = "Response")]
    response: Option<serde_json::Value>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "RAW")]
    raw: Option<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(rename = "PRICE")]
    price: Option<serde_json::Number>,
}

/// Extract the price from a response body.
pub fn parse_price_response(body: &str, pair: &CurrencyPair) -> FxResult<Decimal> {
    let parsed: PriceResponse = serde_json::from_str(body)
        .map_err(|e| FxError::UnexpectedResponse(format!("invalid JSON: {}", e)))?;

    if let Some(serde_json::Value::String(status)) = parsed.response {
        return Err(FxError::PairNotTradable {
            pair: pair.clone(),
            reason: parsed.message.unwrap_or(status),
        });
    }

    let price = parsed
        .raw
        .ok_or_else(|| FxError::UnexpectedResponse("missing RAW section".to_string()))?
        .price
        .ok_or_else(|| FxError::UnexpectedResponse("missing RAW.PRICE".to_string()))?;

    number_to_decimal(&price)
        .ok_or_else(|| FxError::UnexpectedResponse(format!("unrepresentable price {}", price)))
}

fn number_to_decimal(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
        .or_else(|| number.as_f64().and_then(Decimal::from_f64))
}
