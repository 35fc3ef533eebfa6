// topup_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use orka::OrkaError;
use thiserror::Error;

use topup_core::TopupError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Too many requests")]
  RateLimited,

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: OrkaError,
  },

  #[error("Order Lifecycle Error: {source}")]
  Core {
    #[source]
    source: TopupError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<TopupError> for AppError {
  fn from(err: TopupError) -> Self {
    match err {
      TopupError::Validation(m) => AppError::Validation(m),
      TopupError::NotFound { order_id } => AppError::NotFound(format!("order {}", order_id)),
      e @ (TopupError::InvalidTransition { .. } | TopupError::Conflict { .. }) => AppError::Conflict(e.to_string()),
      e @ TopupError::Gateway { .. } => AppError::Gateway(e.to_string()),
      other => AppError::Core { source: other },
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
      AppError::Gateway(_)
      | AppError::Config(_)
      | AppError::Workflow { .. }
      | AppError::Core { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    // Log the full error when it's turned into a response
    tracing::error!(application_error = %self, "Responding with error");
    let status = self.status_code();
    match self {
      AppError::Validation(m) => HttpResponse::build(status).json(json!({"error": "Invalid order data", "detail": m})),
      AppError::Auth(m) | AppError::NotFound(m) | AppError::Conflict(m) => {
        HttpResponse::build(status).json(json!({"error": m}))
      }
      AppError::RateLimited => {
        HttpResponse::build(status).json(json!({"error": "Too many requests, please try again later"}))
      }
      // Buyers only ever see a generic message for downstream failures.
      AppError::Gateway(_) => {
        HttpResponse::build(status).json(json!({"error": "Payment gateway failed, please try again"}))
      }
      AppError::Config(_) | AppError::Workflow { .. } | AppError::Core { .. } | AppError::Internal(_) => {
        HttpResponse::build(status).json(json!({"error": "An internal error occurred"}))
      }
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
