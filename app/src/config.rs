// topup_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use topup_core::{PricingConfig, ServiceSettings, UnknownMethodPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

impl FromStr for StoreBackend {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
      "memory" => Ok(StoreBackend::Memory),
      other => Err(format!("unknown store backend '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Snap,
  Mock,
}

impl FromStr for GatewayKind {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "snap" | "midtrans" => Ok(GatewayKind::Snap),
      "mock" => Ok(GatewayKind::Mock),
      other => Err(format!("unknown payment gateway '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
  #[default]
  Text,
  Json,
}

impl LogFormat {
  /// Read before the rest of the config so the subscriber is up first.
  pub fn from_env() -> Self {
    match env::var("LOG_FORMAT") {
      Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
      _ => LogFormat::Text,
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub auto_migrate: bool,

  pub payment_gateway: GatewayKind,
  pub midtrans_server_key: Option<String>,
  pub midtrans_is_production: bool,
  pub verify_webhook_signature: bool,
  pub gateway_timeout: Duration,

  pub discord_webhook_url: Option<String>,
  pub admin_api_token: Option<String>,

  pub unknown_method_policy: UnknownMethodPolicy,
  pub status_page_size: usize,

  /// Empty means any origin.
  pub cors_allowed_origins: Vec<String>,
  /// Requests per client per window; 0 turns the limiter off.
  pub rate_limit_max_requests: u32,
  pub rate_limit_window: Duration,
  /// Key clients by `Forwarded` / `X-Forwarded-For` instead of the socket peer.
  pub trust_proxy: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let optional_env = |var_name: &str| get_env(var_name).ok().filter(|v| !v.trim().is_empty());
    fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
    where
      T::Err: std::fmt::Display,
    {
      match raw {
        Some(v) => v
          .trim()
          .parse::<T>()
          .map_err(|e| AppError::Config(format!("Invalid {} value: {}", name, e))),
        None => Ok(default),
      }
    }

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = parse_or("SERVER_PORT", optional_env("SERVER_PORT"), 8080u16)?;

    let store_backend = parse_or("STORE_BACKEND", optional_env("STORE_BACKEND"), StoreBackend::Postgres)?;
    let database_url = optional_env("DATABASE_URL");
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "DATABASE_URL is required when STORE_BACKEND=postgres".to_string(),
      ));
    }
    let auto_migrate = parse_or("AUTO_MIGRATE", optional_env("AUTO_MIGRATE"), false)?;

    let payment_gateway = parse_or("PAYMENT_GATEWAY", optional_env("PAYMENT_GATEWAY"), GatewayKind::Snap)?;
    let midtrans_server_key = optional_env("MIDTRANS_SERVER_KEY");
    if payment_gateway == GatewayKind::Snap && midtrans_server_key.is_none() {
      return Err(AppError::Config(
        "MIDTRANS_SERVER_KEY is required when PAYMENT_GATEWAY=snap".to_string(),
      ));
    }
    let midtrans_is_production = parse_or("MIDTRANS_IS_PRODUCTION", optional_env("MIDTRANS_IS_PRODUCTION"), false)?;
    let verify_webhook_signature = parse_or(
      "VERIFY_WEBHOOK_SIGNATURE",
      optional_env("VERIFY_WEBHOOK_SIGNATURE"),
      midtrans_server_key.is_some(),
    )?;
    if verify_webhook_signature && midtrans_server_key.is_none() {
      return Err(AppError::Config(
        "VERIFY_WEBHOOK_SIGNATURE needs MIDTRANS_SERVER_KEY".to_string(),
      ));
    }
    let gateway_timeout_ms = parse_or("GATEWAY_TIMEOUT_MS", optional_env("GATEWAY_TIMEOUT_MS"), 10_000u64)?;

    let discord_webhook_url = optional_env("DISCORD_WEBHOOK_URL");
    let admin_api_token = optional_env("ADMIN_API_TOKEN");

    let unknown_method_policy = parse_or(
      "UNKNOWN_METHOD_POLICY",
      optional_env("UNKNOWN_METHOD_POLICY"),
      UnknownMethodPolicy::default(),
    )?;
    let status_page_size = parse_or("STATUS_PAGE_SIZE", optional_env("STATUS_PAGE_SIZE"), 10usize)?;
    if status_page_size == 0 {
      return Err(AppError::Config("STATUS_PAGE_SIZE must be positive".to_string()));
    }

    let cors_allowed_origins = optional_env("CORS_ALLOWED_ORIGINS")
      .map(|raw| {
        raw
          .split(',')
          .map(str::trim)
          .filter(|o| !o.is_empty() && *o != "*")
          .map(str::to_string)
          .collect::<Vec<_>>()
      })
      .unwrap_or_default();
    let rate_limit_max_requests = parse_or("RATE_LIMIT_MAX_REQUESTS", optional_env("RATE_LIMIT_MAX_REQUESTS"), 100u32)?;
    let rate_limit_window_secs = parse_or("RATE_LIMIT_WINDOW_SECS", optional_env("RATE_LIMIT_WINDOW_SECS"), 900u64)?;
    if rate_limit_window_secs == 0 {
      return Err(AppError::Config("RATE_LIMIT_WINDOW_SECS must be positive".to_string()));
    }
    let trust_proxy = parse_or("TRUST_PROXY", optional_env("TRUST_PROXY"), true)?;

    tracing::info!(
      store = ?store_backend,
      gateway = ?payment_gateway,
      production = midtrans_is_production,
      verify_signature = verify_webhook_signature,
      discord = discord_webhook_url.is_some(),
      admin_routes = admin_api_token.is_some(),
      rate_limit = rate_limit_max_requests,
      rate_limit_window_secs,
      cors_any_origin = cors_allowed_origins.is_empty(),
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      auto_migrate,
      payment_gateway,
      midtrans_server_key,
      midtrans_is_production,
      verify_webhook_signature,
      gateway_timeout: Duration::from_millis(gateway_timeout_ms),
      discord_webhook_url,
      admin_api_token,
      unknown_method_policy,
      status_page_size,
      cors_allowed_origins,
      rate_limit_max_requests,
      rate_limit_window: Duration::from_secs(rate_limit_window_secs),
      trust_proxy,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  /// Production fee table with the configured unknown-method policy.
  pub fn pricing_config(&self) -> PricingConfig {
    PricingConfig {
      unknown_method_policy: self.unknown_method_policy,
      ..PricingConfig::default()
    }
  }

  pub fn service_settings(&self) -> ServiceSettings {
    ServiceSettings {
      gateway_timeout: self.gateway_timeout,
      status_page_size: self.status_page_size,
      ..ServiceSettings::default()
    }
  }
}

#[cfg(test)]
impl AppConfig {
  /// In-memory store, mock gateway, no outbound calls, no rate limit.
  pub fn for_tests() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 0,
      store_backend: StoreBackend::Memory,
      database_url: None,
      auto_migrate: false,
      payment_gateway: GatewayKind::Mock,
      midtrans_server_key: None,
      midtrans_is_production: false,
      verify_webhook_signature: false,
      gateway_timeout: Duration::from_millis(500),
      discord_webhook_url: None,
      admin_api_token: Some("test-admin-token".to_string()),
      unknown_method_policy: UnknownMethodPolicy::ZeroFee,
      status_page_size: 10,
      cors_allowed_origins: Vec::new(),
      rate_limit_max_requests: 0,
      rate_limit_window: Duration::from_secs(900),
      trust_proxy: true,
    }
  }
}
