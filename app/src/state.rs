// topup_app/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError; // Error type Orka::run reports
use crate::pipelines;
use crate::web::middleware::RateLimiter;
use orka::Orka;
use std::sync::Arc;
use topup_core::OrderService;

#[derive(Clone)]
pub struct AppState {
  pub orders: Arc<OrderService>,
  pub config: Arc<AppConfig>, // Share loaded config
  pub orka_instance: Arc<Orka<AppError>>,
  pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
  /// Builds the shared state and registers every pipeline the handlers run.
  pub fn new(orders: OrderService, config: AppConfig) -> Self {
    let state = Self {
      orders: Arc::new(orders),
      rate_limiter: Arc::new(RateLimiter::from_config(&config)),
      config: Arc::new(config),
      orka_instance: Arc::new(Orka::<AppError>::new()),
    };
    pipelines::register_all_pipelines(&state.orka_instance);
    state
  }
}
