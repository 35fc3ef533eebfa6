// topup_core/src/error.rs

//! The single error type returned across the store, gateway and service boundaries.

use crate::order::{OrderId, OrderStatus};
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopupError {
    /// Malformed or missing input. Never persisted, never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("Payment gateway error: {message}")]
    Gateway {
        message: String,
        #[source]
        source: Option<AnyhowError>,
    },

    #[error("Order store failed during '{operation}'. Source: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: AnyhowError,
    },

    /// A guarded status update found the order in a different status than expected.
    #[error("Order {order_id} is {current}, expected {expected}")]
    Conflict {
        order_id: OrderId,
        expected: OrderStatus,
        current: OrderStatus,
    },

    #[error("Cannot {action} order {order_id} while it is {current}")]
    InvalidTransition {
        order_id: OrderId,
        action: &'static str,
        current: OrderStatus,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TopupError {
    pub fn gateway(message: impl Into<String>) -> Self {
        TopupError::Gateway {
            message: message.into(),
            source: None,
        }
    }

    pub fn gateway_from(message: impl Into<String>, source: impl Into<AnyhowError>) -> Self {
        TopupError::Gateway {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn store(operation: &'static str, source: impl Into<AnyhowError>) -> Self {
        TopupError::Store {
            operation,
            source: source.into(),
        }
    }

    /// Whether the caller (or the gateway's redelivery) may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TopupError::Gateway { .. } | TopupError::Store { .. } | TopupError::Conflict { .. }
        )
    }
}

impl From<validator::ValidationErrors> for TopupError {
    fn from(errors: validator::ValidationErrors) -> Self {
        TopupError::Validation(errors.to_string())
    }
}

pub type TopupResult<T, E = TopupError> = std::result::Result<T, E>;
