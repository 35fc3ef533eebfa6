// topup_app/src/pipelines/mod.rs

//! Orka pipelines for the two multi-step flows: order creation and gateway
//! notification processing. Each step delegates to one `OrderService` call.

use crate::errors::AppError;
use orka::Orka;
use std::sync::Arc;

pub mod contexts;
pub mod create_order_pipeline;
pub mod webhook_pipeline;

/// Called once while building `AppState`.
pub fn register_all_pipelines(orka_instance: &Arc<Orka<AppError>>) {
  tracing::info!("Registering Orka pipelines...");

  create_order_pipeline::register_create_order_pipeline(orka_instance);
  webhook_pipeline::register_webhook_pipeline(orka_instance);

  tracing::info!("All application pipelines registered with Orka.");
}
