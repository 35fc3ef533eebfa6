// topup_app/src/web/handlers/admin_handlers.rs

use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use topup_core::{OperatorAction, OrderFilter, OrderStatus};

// --- Extractor for the operator bearer token ---
#[derive(Debug)]
pub struct OperatorAuth;

impl FromRequest for OperatorAuth {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    futures_util::future::ready(authorize(req))
  }
}

fn authorize(req: &HttpRequest) -> Result<OperatorAuth, AppError> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("application state is not registered".to_string()))?;
  let Some(expected) = state.config.admin_api_token.as_deref() else {
    return Err(AppError::NotFound("operator routes are disabled".to_string()));
  };

  let provided = req
    .headers()
    .get(actix_web::http::header::AUTHORIZATION)
    .and_then(|h| h.to_str().ok())
    .and_then(|h| h.strip_prefix("Bearer "))
    .map(str::trim);
  match provided {
    Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(OperatorAuth),
    _ => {
      warn!("OperatorAuth extractor: missing or invalid bearer token.");
      Err(AppError::Auth("operator token required".to_string()))
    }
  }
}

// --- Query DTO ---
#[derive(Deserialize, Debug, Default)]
pub struct OrderListQuery {
  pub status: Option<String>,
  pub search: Option<String>,
  pub limit: Option<usize>,
}

impl TryFrom<OrderListQuery> for OrderFilter {
  type Error = AppError;

  fn try_from(query: OrderListQuery) -> Result<Self, Self::Error> {
    let status = match query.status.as_deref().map(str::trim) {
      None | Some("") | Some("ALL") => None,
      Some(s) => Some(s.parse::<OrderStatus>().map_err(AppError::Validation)?),
    };
    Ok(OrderFilter {
      status,
      search: query.search.filter(|s| !s.trim().is_empty()),
      limit: query.limit,
    })
  }
}

// --- Handler Implementations ---

#[instrument(name = "handler::admin_list_orders", skip(app_state, _auth))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderListQuery>,
  _auth: OperatorAuth,
) -> Result<HttpResponse, AppError> {
  let filter = OrderFilter::try_from(query.into_inner())?;
  let views = app_state.orders.operator_orders(&filter).await?;
  let flagged = views.iter().filter(|v| v.resale_price_warning.is_some()).count();
  info!(count = views.len(), flagged, "Operator order listing served.");
  Ok(HttpResponse::Ok().json(views))
}

#[instrument(name = "handler::admin_order_action", skip(app_state, _auth))]
pub async fn order_action_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(String, String)>,
  _auth: OperatorAuth,
) -> Result<HttpResponse, AppError> {
  let (raw_id, raw_action) = path.into_inner();
  let order_id = Uuid::parse_str(raw_id.trim())
    .map_err(|_| AppError::Validation(format!("'{}' is not a valid order id", raw_id)))?;
  let action = raw_action.parse::<OperatorAction>().map_err(AppError::Validation)?;

  let order = app_state.orders.apply_operator_action(order_id, action).await?;
  info!(%order_id, action = action.as_str(), status = %order.status, "Operator action applied.");
  Ok(HttpResponse::Ok().json(order))
}
