// topup_core/src/notifier.rs

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
  NewOrder,
  PaymentSuccess,
  Failed,
}

impl OrderEvent {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderEvent::NewOrder => "new_order",
      OrderEvent::PaymentSuccess => "payment_success",
      OrderEvent::Failed => "failed",
    }
  }
}

impl fmt::Display for OrderEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Human-facing alert channel. Implementations may fail freely; callers go
/// through [`notify_best_effort`], which never lets a failure escape.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify(&self, order: &Order, event: OrderEvent) -> anyhow::Result<()>;
}

pub async fn notify_best_effort(notifier: &dyn Notifier, order: &Order, event: OrderEvent) {
  match notifier.notify(order, event).await {
    Ok(()) => debug!(order_id = %order.id, %event, "Notification delivered."),
    Err(e) => warn!(order_id = %order.id, %event, error = %e, "Notification failed; discarding."),
  }
}

/// Writes events to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
  async fn notify(&self, order: &Order, event: OrderEvent) -> anyhow::Result<()> {
    info!(
      order_id = %order.id,
      %event,
      username = %order.buyer.username,
      amount = order.amount,
      status = %order.status,
      "Order event."
    );
    Ok(())
  }
}
