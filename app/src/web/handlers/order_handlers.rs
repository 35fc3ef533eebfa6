// topup_app/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orka::{ContextData, PipelineResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::CreateOrderCtxData;
use crate::state::AppState;
use topup_core::CreateOrderRequest;

/// Buyer ids arrive as JSON numbers from the storefront; strings are tolerated.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum UserIdPayload {
  Number(u64),
  Text(String),
}

impl UserIdPayload {
  fn into_string(self) -> String {
    match self {
      UserIdPayload::Number(n) => n.to_string(),
      UserIdPayload::Text(s) => s.trim().to_string(),
    }
  }
}

// --- Request DTO ---
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
  pub username: String,
  pub user_id: UserIdPayload,
  pub email: String,
  pub amount: u32,
  pub payment_method: String,
  pub whatsapp: Option<String>,
  pub gamepass_link: Option<String>,
}

impl From<CreateOrderPayload> for CreateOrderRequest {
  fn from(payload: CreateOrderPayload) -> Self {
    CreateOrderRequest {
      username: payload.username,
      user_id: payload.user_id.into_string(),
      email: payload.email.trim().to_string(),
      amount: payload.amount,
      payment_method: payload.payment_method.trim().to_string(),
      whatsapp: payload.whatsapp,
      gamepass_link: payload.gamepass_link,
    }
  }
}

// --- Handler Implementation ---

#[instrument(
    name = "handler::create_order",
    skip(app_state, req_payload),
    fields(username = %req_payload.username, amount = req_payload.amount, method = %req_payload.payment_method)
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CreateOrderPayload>,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(CreateOrderCtxData::new(
    app_state.get_ref().clone(),
    req_payload.into_inner().into(),
  ));

  if app_state.orka_instance.run(ctx.clone()).await? == PipelineResult::Stopped {
    warn!("Create-order pipeline was stopped by a handler.");
    return Err(AppError::Internal("order creation was halted".to_string()));
  }

  let guard = ctx.read();
  let (Some(order), Some(quote), Some(payment)) = (&guard.order, &guard.quote, &guard.payment) else {
    return Err(AppError::Internal(
      "order creation completed without a payment token".to_string(),
    ));
  };

  info!(order_id = %order.id, "Order created; returning payment token.");
  Ok(HttpResponse::Ok().json(json!({
    "orderId": order.id,
    "token": payment.token,
    "redirect_url": payment.redirect_url,
    "basePrice": quote.base_price,
    "adminFee": quote.admin_fee,
    "grossAmount": quote.gross_amount,
    "gamepassPrice": quote.resale_price,
  })))
}

#[instrument(name = "handler::order_status", skip(app_state))]
pub async fn order_status_handler(
  app_state: web::Data<AppState>,
  username: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.orders_for_user(&username).await?;
  Ok(HttpResponse::Ok().json(orders))
}
