use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use fleetpay::{
    client::StripeGateway,
    config::Config,
    handlers::*,
    services::*,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting FleetPay API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Initialize services
    let gateway = build_gateway(&config)?;
    let security = Arc::new(SecurityGuard::new(config.security.clone()));
    let transactions = Arc::new(InMemoryTransactionStore::new());
    let payout_store = Arc::new(InMemoryPayoutStore::new());
    let drivers = Arc::new(InMemoryDriverDirectory::new());

    let payments = Arc::new(PaymentService::new(
        gateway.clone(),
        transactions.clone(),
        security.clone(),
    ));
    let payouts = Arc::new(PayoutService::new(
        gateway.clone(),
        payout_store.clone(),
        drivers.clone(),
        security.clone(),
    ));
    let webhooks = Arc::new(WebhookService::new(
        payments.clone(),
        config.webhook_secret.clone(),
        config.webhook_tolerance_secs,
    ));

    let webhook_configured = config.webhook_secret.is_some();

    let app_state = AppState {
        payments,
        payouts,
        webhooks,
        webhook_configured,
        started_at: Instant::now(),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/payments/create-intent", post(create_charge))
        .route("/api/payments/confirm", post(confirm_charge))
        .route("/api/payments/cancel", post(cancel_charge))
        .route("/api/payments/webhook", post(handle_webhook))
        .route("/api/payouts", post(create_payout))
        .route("/api/payouts/:payout_id/attempt", post(attempt_payout))
        .route("/api/payouts/:payout_id/retry", post(retry_payout))
        .route("/api/payouts/driver/:driver_id", get(list_driver_payouts))
        .route("/api/payouts/order/:order_id", get(get_order_payout))
        .route(
            "/api/payouts/connect/create-account",
            post(create_connect_account),
        )
        .route(
            "/api/payouts/connect/create-link",
            post(create_account_link),
        )
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Webhook endpoint: http://{}/api/payments/webhook", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_gateway(config: &Config) -> Result<Arc<StripeGateway>> {
    Ok(Arc::new(StripeGateway::new(
        &config.gateway_base_url,
        &config.gateway_secret_key,
        config.gateway_timeout_ms,
    )?))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    tracing::info!("Shutting down gracefully...");
}
