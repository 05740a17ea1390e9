//! CryptoSwap Wallet Service Binary
//!
//! Serves balances and the quote/finalize exchange over HTTP.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cryptoswap_crypto::{IntentTokenCodec, SigningSecret};
use cryptoswap_exchange::api::{create_router, ApiState};
use cryptoswap_exchange::{
    EngineConfig, ExchangeEngine, MemoryRedemptionGuard, Metrics, RedemptionGuard,
    RedisRedemptionGuard, ServiceConfig,
};
use cryptoswap_fx::{HttpProviderConfig, HttpRateProvider, PriceOracle};
use cryptoswap_ledger::{schema, PgBalanceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = ServiceConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Initialize logging; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting CryptoSwap wallet service");

    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    info!(config = ?config, "Configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    schema::create_tables(&pool).await?;
    if let Some(dir) = &config.seed_data_dir {
        schema::seed_from_dir(&pool, dir).await?;
    }

    let provider = HttpRateProvider::new(HttpProviderConfig {
        url_template: config.price_api_url.clone(),
        timeout: config.price_api_timeout,
    })?;
    let oracle = Arc::new(PriceOracle::new(Arc::new(provider)));

    let secret = SigningSecret::from_bytes(config.jwt_secret.as_bytes())?;
    info!(key_id = %secret.key_id(), "Token signing secret loaded");
    let codec = IntentTokenCodec::new(secret);

    let guard: Arc<dyn RedemptionGuard> = match &config.redis_url {
        Some(url) => {
            let guard = RedisRedemptionGuard::connect(url).await?;
            guard.health_check().await?;
            Arc::new(guard)
        }
        None => {
            warn!("REDIS_URL not set, redemption records are kept in process memory");
            let guard = Arc::new(MemoryRedemptionGuard::new());
            guard.clone().spawn_cleanup(config.guard_cleanup_interval);
            guard
        }
    };

    let engine = Arc::new(ExchangeEngine::new(
        Arc::new(PgBalanceStore::new(pool)),
        oracle,
        codec,
        guard,
        Arc::new(Metrics::new()),
        EngineConfig {
            quote_ttl: config.quote_ttl,
        },
    ));
    let router = create_router(Arc::new(ApiState { engine }));

    let listener =
        tokio::net::TcpListener::bind((config.listen_addr.as_str(), config.listen_port)).await?;
    info!(
        listen_addr = %config.listen_addr,
        listen_port = %config.listen_port,
        "Wallet service running"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Wallet service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
