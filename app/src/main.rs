// topup_app/src/main.rs

// Declare modules for the application
mod config;
mod db;
mod errors;
mod models;
mod pipelines;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, GatewayKind, LogFormat, StoreBackend};
use crate::db::PgOrderStore;
use crate::services::{DiscordNotifier, MockGateway, SnapGateway};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer}; // Renamed web to actix_data
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use topup_core::{InMemoryOrderStore, Notifier, OrderService, OrderStore, PaymentGateway, PricingEngine, TracingNotifier};
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing
use tracing_subscriber::EnvFilter;

const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter) // RUST_LOG override
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Text => builder.init(),
  }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
  tracing::error!(error = %err, "{}", context);
  std::io::Error::other(format!("{}: {}", context, err))
}

async fn build_store(config: &AppConfig) -> std::io::Result<Arc<dyn OrderStore>> {
  match config.store_backend {
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| startup_error("Store setup failed", "DATABASE_URL is not set"))?;
      let pool = PgPool::connect(url)
        .await
        .map_err(|e| startup_error("Failed to connect to the database", e))?;
      tracing::info!("Successfully connected to the database.");
      let store = PgOrderStore::new(pool);
      if config.auto_migrate {
        store
          .migrate()
          .await
          .map_err(|e| startup_error("Database migration failed", e))?;
        tracing::info!("Database migrations applied.");
      }
      Ok(Arc::new(store))
    }
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory order store; orders are lost on restart.");
      Ok(Arc::new(InMemoryOrderStore::new()))
    }
  }
}

fn build_gateway(config: &AppConfig) -> std::io::Result<Arc<dyn PaymentGateway>> {
  match config.payment_gateway {
    GatewayKind::Snap => {
      let server_key = config
        .midtrans_server_key
        .as_deref()
        .ok_or_else(|| startup_error("Gateway setup failed", "MIDTRANS_SERVER_KEY is not set"))?;
      let gateway = SnapGateway::new(server_key, config.midtrans_is_production, config.gateway_timeout)
        .map_err(|e| startup_error("Failed to build the Snap client", e))?;
      Ok(Arc::new(gateway))
    }
    GatewayKind::Mock => {
      tracing::warn!("Using the mock payment gateway; no real transactions are opened.");
      Ok(Arc::new(MockGateway::new(format!("http://{}", config.server_address()))))
    }
  }
}

fn build_notifier(config: &AppConfig) -> std::io::Result<Arc<dyn Notifier>> {
  match config.discord_webhook_url.as_deref() {
    Some(url) => {
      let notifier =
        DiscordNotifier::new(url, NOTIFIER_TIMEOUT).map_err(|e| startup_error("Failed to build the Discord client", e))?;
      Ok(Arc::new(notifier))
    }
    None => Ok(Arc::new(TracingNotifier)),
  }
}

// Main function
#[actix_web::main]
async fn main() -> std::io::Result<()> {
  dotenvy::dotenv().ok();
  init_tracing(LogFormat::from_env());

  tracing::info!("Starting top-up order server...");

  // Load application configuration
  let app_config = AppConfig::from_env().map_err(|e| startup_error("Failed to load application configuration", e))?;

  let store = build_store(&app_config).await?;
  let gateway = build_gateway(&app_config)?;
  let notifier = build_notifier(&app_config)?;
  tracing::info!(gateway = gateway.name(), "Order service wired.");

  let orders = OrderService::new(
    store,
    gateway,
    notifier,
    PricingEngine::new(app_config.pricing_config()),
    app_config.service_settings(),
  );

  let server_address = app_config.server_address();
  let app_state = AppState::new(orders, app_config);
  tracing::info!("Orka pipelines registered.");

  // Drop expired rate-limit windows so idle clients do not accumulate
  let rate_limiter = app_state.rate_limiter.clone();
  actix_web::rt::spawn(async move {
    let mut ticker = tokio::time::interval(rate_limiter.window());
    loop {
      ticker.tick().await;
      rate_limiter.prune();
    }
  });

  // Configure and Start Actix Web Server
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(web::middleware::cors_policy(&app_state.config)) // Storefront is a separate origin
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
