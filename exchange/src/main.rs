//! Coinrate Exchange Server
//!
//! Serves the current BTC/CAD rate and simulated trades over HTTP.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinrate_exchange::{http, ExchangeConfig, ExchangeService, TradeExecutor};
use coinrate_fx::{adapters, HttpFetcher, RateCache, RateCascade};
use coinrate_ledger::Ledger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExchangeConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Coinrate exchange");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let rate_config = &config.rate_config;
    let http_client = HttpFetcher::new(rate_config.provider_timeout)?;
    let cascade = Arc::new(
        RateCascade::new(adapters::default_sources(http_client))
            .with_attempt_timeout(rate_config.provider_timeout),
    );
    info!(providers = ?cascade.source_names(), "Rate providers configured");

    let rates = Arc::new(RateCache::with_config(cascade.clone(), rate_config.cache_config()));
    let service = Arc::new(
        ExchangeService::new(
            rates,
            Arc::new(Ledger::new()),
            TradeExecutor::new(config.trade_config.clone()),
        )
        .with_cascade(cascade),
    );
    let admin = service.init(&config.bootstrap_config)?;
    info!(account = %admin.id, username = %admin.username, "Administrator ready");

    let addr = format!("{}:{}", config.listen_addr, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(listen_addr = %addr, "Exchange listening");

    axum::serve(listener, http::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Exchange shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
