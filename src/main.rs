//! settlement-gateway server entry point.
//!
//! Runs database migrations, wires the services, and starts the Axum
//! HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use settlement_gateway::api;
use settlement_gateway::app_state::AppState;
use settlement_gateway::config::ServiceConfig;
use settlement_gateway::notify::TracingSink;
use settlement_gateway::persistence::PostgresLedger;
use settlement_gateway::processor::{SignatureVerifier, StripeConnectClient};
use settlement_gateway::service::{
    AccountSyncService, BookingService, PayoutPolicy, PayoutService, RewardService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServiceConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting settlement-gateway");

    // Connect and migrate
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    // Build persistence and outbound clients
    let ledger = Arc::new(PostgresLedger::new(pool));
    let processor = Arc::new(StripeConnectClient::new(
        &config.processor_base_url,
        &config.processor_secret_key,
        config.processor_timeout_secs,
    )?);
    let notifier = Arc::new(TracingSink);
    let verifier = Arc::new(SignatureVerifier::new(
        &config.processor_webhook_secret,
        config.webhook_tolerance_secs,
    ));

    // Build service layer
    let policy = PayoutPolicy {
        commission_tax_rate: config.commission_tax_rate,
        currency: config.payout_currency.clone(),
        notify_max_attempts: config.notify_max_attempts,
        notify_base_delay_ms: config.notify_base_delay_ms,
    };
    let app_state = AppState {
        bookings: Arc::new(BookingService::new(Arc::clone(&ledger))),
        rewards: Arc::new(RewardService::new(Arc::clone(&ledger))),
        payouts: Arc::new(PayoutService::new(
            Arc::clone(&ledger),
            processor,
            notifier,
            policy,
        )),
        account_sync: Arc::new(AccountSyncService::new(Arc::clone(&ledger))),
        verifier,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
