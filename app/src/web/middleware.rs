// topup_app/src/web/middleware.rs

//! Cross-origin policy for the storefront and a per-client request limiter.

use actix_cors::Cors;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::state::AppState;

/// The storefront is served from another origin; it only ever reads and posts.
pub fn cors_policy(config: &AppConfig) -> Cors {
  let cors = Cors::default()
    .allowed_methods(vec!["GET", "POST"])
    .allow_any_header()
    .max_age(3600);
  if config.cors_allowed_origins.is_empty() {
    return cors.allow_any_origin();
  }
  config
    .cors_allowed_origins
    .iter()
    .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

struct ClientWindow {
  count: u32,
  started: Instant,
}

/// Fixed-window counter keyed by client address.
pub struct RateLimiter {
  max_requests: u32,
  window: Duration,
  clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
  pub fn new(max_requests: u32, window: Duration) -> Self {
    Self {
      max_requests,
      window,
      clients: Mutex::new(HashMap::new()),
    }
  }

  pub fn from_config(config: &AppConfig) -> Self {
    Self::new(config.rate_limit_max_requests, config.rate_limit_window)
  }

  pub fn window(&self) -> Duration {
    self.window
  }

  /// Counts the request and reports whether it fits in the client's window.
  pub fn check(&self, client: &str) -> bool {
    if self.max_requests == 0 {
      return true;
    }
    let now = Instant::now();
    let mut clients = self.clients.lock();
    let entry = clients.entry(client.to_owned()).or_insert(ClientWindow {
      count: 0,
      started: now,
    });
    if now.duration_since(entry.started) >= self.window {
      entry.count = 0;
      entry.started = now;
    }
    entry.count += 1;
    entry.count <= self.max_requests
  }

  /// Drops windows that have already expired.
  pub fn prune(&self) {
    let now = Instant::now();
    self
      .clients
      .lock()
      .retain(|_, entry| now.duration_since(entry.started) < self.window);
  }

  pub fn tracked_clients(&self) -> usize {
    self.clients.lock().len()
  }
}

fn client_key(req: &ServiceRequest, trust_proxy: bool) -> String {
  let addr = if trust_proxy {
    req.connection_info().realip_remote_addr().map(str::to_owned)
  } else {
    req.peer_addr().map(|addr| addr.ip().to_string())
  };
  addr.unwrap_or_else(|| "unknown".to_owned())
}

pub async fn rate_limit<B: MessageBody>(
  req: ServiceRequest,
  next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error> {
  let state = match req.app_data::<web::Data<AppState>>() {
    Some(state) => state.clone(),
    None => return next.call(req).await.map(ServiceResponse::map_into_left_body),
  };

  let client = client_key(&req, state.config.trust_proxy);
  if state.rate_limiter.check(&client) {
    return next.call(req).await.map(ServiceResponse::map_into_left_body);
  }

  warn!(%client, path = %req.path(), "Rate limit exceeded.");
  Ok(req.error_response(AppError::RateLimited).map_into_right_body())
}
