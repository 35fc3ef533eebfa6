// topup_app/src/pipelines/contexts.rs

//! Underlying data for each pipeline. Handlers receive these wrapped in
//! `orka::ContextData`.

use crate::state::AppState;
use actix_web::web::Bytes;
use topup_core::{CallbackOutcome, CreateOrderRequest, GatewayNotification, Order, PaymentArtifact, PriceQuote};

#[derive(Clone)]
pub struct CreateOrderCtxData {
  pub app_state: AppState,
  pub request: CreateOrderRequest,
  pub quote: Option<PriceQuote>,
  pub order: Option<Order>,
  pub payment: Option<PaymentArtifact>,
}

impl CreateOrderCtxData {
  pub fn new(app_state: AppState, request: CreateOrderRequest) -> Self {
    Self {
      app_state,
      request,
      quote: None,
      order: None,
      payment: None,
    }
  }
}

#[derive(Clone)]
pub struct PaymentWebhookCtxData {
  pub app_state: AppState,
  pub raw_payload: Bytes,
  /// `None` when the body could not be read as a notification at all.
  pub notification: Option<GatewayNotification>,
  pub outcome: Option<CallbackOutcome>,
  pub acknowledged: bool,
}

impl PaymentWebhookCtxData {
  pub fn new(app_state: AppState, raw_payload: Bytes) -> Self {
    Self {
      app_state,
      raw_payload,
      notification: None,
      outcome: None,
      acknowledged: false,
    }
  }
}
