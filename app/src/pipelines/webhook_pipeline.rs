// topup_app/src/pipelines/webhook_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use orka::core::step::SkipCondition;
use orka::{ContextData, Orka, Pipeline, PipelineControl};
use sha2::{Digest, Sha512};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use topup_core::{CallbackOutcome, GatewayNotification};
use tracing::{info, warn};

/// hex(SHA-512(order_id + status_code + gross_amount + server_key))
pub fn expected_signature(notification: &GatewayNotification, server_key: &str) -> String {
  let mut hasher = Sha512::new();
  hasher.update(notification.order_id.as_bytes());
  hasher.update(notification.status_code.as_deref().unwrap_or_default().as_bytes());
  hasher.update(notification.gross_amount.as_deref().unwrap_or_default().as_bytes());
  hasher.update(server_key.as_bytes());
  hex::encode(hasher.finalize())
}

fn verify_signature(notification: &GatewayNotification, server_key: &str) -> Result<(), AppError> {
  let provided = notification
    .signature_key
    .as_deref()
    .ok_or_else(|| AppError::Auth("missing signature_key".to_string()))?;
  let expected = expected_signature(notification, server_key);
  if bool::from(expected.as_bytes().ct_eq(provided.trim().to_ascii_lowercase().as_bytes())) {
    Ok(())
  } else {
    Err(AppError::Auth("signature_key mismatch".to_string()))
  }
}

pub fn register_webhook_pipeline(orka_registry: &Arc<Orka<AppError>>) {
  let signature_check_disabled: SkipCondition<PaymentWebhookCtxData> =
    Arc::new(|ctx_data: ContextData<PaymentWebhookCtxData>| !ctx_data.read().app_state.config.verify_webhook_signature);

  let mut p = Pipeline::<PaymentWebhookCtxData, AppError>::new(&[
    ("parse_notification", false, None),
    ("verify_signature", false, Some(signature_check_disabled)),
    ("reconcile_order", false, None),
    ("acknowledge_receipt", false, None),
  ]);

  // Step 1: read the payload. Unreadable bodies are kept as `None` and acknowledged later.
  p.on_root("parse_notification", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let parsed = {
        let guard = ctx_data.read();
        serde_json::from_slice::<GatewayNotification>(&guard.raw_payload)
      };
      match parsed {
        Ok(notification) => ctx_data.write().notification = Some(notification),
        Err(e) => warn!(error = %e, "Notification body is not a readable payload."),
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2: signature_key check, skipped when verification is off
  p.on_root("verify_signature", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      let server_key = guard
        .app_state
        .config
        .midtrans_server_key
        .as_deref()
        .ok_or_else(|| AppError::Config("signature check enabled without a server key".to_string()))?;
      let notification = guard
        .notification
        .as_ref()
        .ok_or_else(|| AppError::Auth("unreadable payload cannot be verified".to_string()))?;
      verify_signature(notification, server_key).map_err(|e| {
        warn!(order_id = %notification.order_id, error = %e, "Rejected notification with a bad signature.");
        e
      })?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 3: the state-machine decision and guarded write
  p.on_root("reconcile_order", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      let (orders, notification) = {
        let guard = ctx_data.read();
        (guard.app_state.orders.clone(), guard.notification.clone())
      };
      let Some(notification) = notification else {
        warn!("Unreadable notification acknowledged without action.");
        ctx_data.write().acknowledged = true;
        return Ok::<_, AppError>(PipelineControl::Stop);
      };

      let outcome = orders.handle_notification(&notification).await?;
      match &outcome {
        CallbackOutcome::Applied(order) => {
          info!(order_id = %order.id, status = %order.status, "Notification applied.");
        }
        CallbackOutcome::Unchanged { order_id, reason } => {
          info!(%order_id, ?reason, "Notification acknowledged without change.");
        }
        CallbackOutcome::OrderNotFound { order_id } => {
          warn!(%order_id, "Notification for an unknown order acknowledged.");
        }
      }
      ctx_data.write().outcome = Some(outcome);
      Ok(PipelineControl::Continue)
    })
  });

  // Step 4: a decision was reached; the handler answers 200
  p.on_root("acknowledge_receipt", |ctx_data: ContextData<PaymentWebhookCtxData>| {
    Box::pin(async move {
      ctx_data.write().acknowledged = true;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  orka_registry.register_pipeline(p);
  info!("Payment webhook pipeline registered.");
}
