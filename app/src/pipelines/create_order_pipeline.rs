// topup_app/src/pipelines/create_order_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::CreateOrderCtxData;
use orka::{ContextData, Orka, Pipeline, PipelineControl};
use std::sync::Arc;
use tracing::info;

fn missing(field: &str) -> AppError {
  AppError::Internal(format!("order creation reached a step without a {}", field))
}

pub fn register_create_order_pipeline(orka_registry: &Arc<Orka<AppError>>) {
  let mut p = Pipeline::<CreateOrderCtxData, AppError>::new(&[
    ("validate_request", false, None),
    ("quote_price", false, None),
    ("record_order", false, None),
    ("announce_new_order", true, None), // Best-effort
    ("open_transaction", false, None),
  ]);

  // Step 1: reject malformed input before anything is written
  p.on_root("validate_request", |ctx_data: ContextData<CreateOrderCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      guard.app_state.orders.validate_request(&guard.request)?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2: base price, admin fee and resale price
  p.on_root("quote_price", |ctx_data: ContextData<CreateOrderCtxData>| {
    Box::pin(async move {
      let quote = {
        let guard = ctx_data.read();
        guard.app_state.orders.quote(&guard.request)
      };
      ctx_data.write().quote = Some(quote);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: persist as PENDING_PAYMENT
  p.on_root("record_order", |ctx_data: ContextData<CreateOrderCtxData>| {
    Box::pin(async move {
      let (orders, request, quote) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.request.clone(), guard.quote)
      };
      let quote = quote.ok_or_else(|| missing("quote"))?;
      let order = orders.record_order(request, quote).await?;
      ctx_data.write().order = Some(order);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 4: operator alert; failures are logged inside the notifier boundary
  p.on_root("announce_new_order", |ctx_data: ContextData<CreateOrderCtxData>| {
    Box::pin(async move {
      let (orders, order) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order.clone())
      };
      if let Some(order) = order {
        orders.announce_new_order(&order).await;
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 5: ask the gateway for a payment token. A failure leaves the order pending.
  p.on_root("open_transaction", |ctx_data: ContextData<CreateOrderCtxData>| {
    Box::pin(async move {
      let (orders, order, quote) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.order.clone(), guard.quote)
      };
      let order = order.ok_or_else(|| missing("recorded order"))?;
      let quote = quote.ok_or_else(|| missing("quote"))?;
      let payment = orders.open_transaction(&order, &quote).await?;
      ctx_data.write().payment = Some(payment);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  orka_registry.register_pipeline(p);
  info!("Create-order pipeline registered.");
}
