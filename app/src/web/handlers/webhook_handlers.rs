// topup_app/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpResponse};
use orka::{ContextData, PipelineResult};
use tracing::{debug, instrument};

use crate::errors::AppError;
use crate::pipelines::contexts::PaymentWebhookCtxData;
use crate::state::AppState;

// --- Handler Implementation ---

/// Acknowledges with 200 whenever the pipeline reached a decision, including
/// unknown orders and unreadable payloads. A bad signature answers 401 and a
/// store failure 500, so the gateway redelivers.
#[instrument(name = "handler::payment_webhook", skip(app_state, body), fields(payload_bytes = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(PaymentWebhookCtxData::new(app_state.get_ref().clone(), body));

  let result = app_state.orka_instance.run(ctx.clone()).await?;
  if result == PipelineResult::Stopped {
    debug!("Webhook pipeline stopped early.");
  }

  let acknowledged = ctx.read().acknowledged;
  if !acknowledged {
    return Err(AppError::Internal(
      "webhook pipeline finished without acknowledging".to_string(),
    ));
  }
  Ok(HttpResponse::Ok().body("OK"))
}
