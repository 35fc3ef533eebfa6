// topup_core/src/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::pricing::{PriceQuote, PricingEngine};

pub type OrderId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
  PendingPayment,
  AwaitingFulfillment,
  Fulfilled,
  Failed,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::PendingPayment => "PENDING_PAYMENT",
      OrderStatus::AwaitingFulfillment => "AWAITING_FULFILLMENT",
      OrderStatus::Fulfilled => "FULFILLED",
      OrderStatus::Failed => "FAILED",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Fulfilled | OrderStatus::Failed)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "PENDING_PAYMENT" => Ok(OrderStatus::PendingPayment),
      "AWAITING_FULFILLMENT" => Ok(OrderStatus::AwaitingFulfillment),
      "FULFILLED" => Ok(OrderStatus::Fulfilled),
      "FAILED" => Ok(OrderStatus::Failed),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
  Unset,
  Paid,
  Failed,
}

impl PaymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Unset => "UNSET",
      PaymentStatus::Paid => "PAID",
      PaymentStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "UNSET" => Ok(PaymentStatus::Unset),
      "PAID" => Ok(PaymentStatus::Paid),
      "FAILED" => Ok(PaymentStatus::Failed),
      other => Err(format!("unknown payment status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
  pub username: String,
  /// Numeric id on the game platform, kept as text.
  pub user_id: String,
  pub email: String,
  pub whatsapp: Option<String>,
}

/// Everything the store needs to persist a fresh order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub amount: u32,
  pub buyer: Buyer,
  pub gamepass_link: Option<String>,
  pub payment_method: String,
  pub quote: PriceQuote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: OrderId,
  pub amount: u32,
  pub buyer: Buyer,
  pub gamepass_link: Option<String>,
  pub payment_method: String,
  pub base_price: i64,
  pub admin_fee: i64,
  pub gross_amount: i64,
  /// Fixed at creation; never recomputed.
  pub resale_price: i64,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// Builds the initial record: `PENDING_PAYMENT` / `UNSET`.
  pub fn from_new(id: OrderId, new_order: NewOrder, now: DateTime<Utc>) -> Self {
    Self {
      id,
      amount: new_order.amount,
      buyer: new_order.buyer,
      gamepass_link: new_order.gamepass_link,
      payment_method: new_order.payment_method,
      base_price: new_order.quote.base_price,
      admin_fee: new_order.quote.admin_fee,
      gross_amount: new_order.quote.gross_amount,
      resale_price: new_order.quote.resale_price,
      status: OrderStatus::PendingPayment,
      payment_status: PaymentStatus::Unset,
      created_at: now,
      updated_at: now,
    }
  }

  /// Compares the stored resale price with the one the engine would compute today.
  pub fn resale_price_check(&self, pricing: &PricingEngine) -> Option<ResalePriceMismatch> {
    let expected = pricing.resale_price(self.amount);
    if expected == self.resale_price {
      None
    } else {
      Some(ResalePriceMismatch {
        stored: self.resale_price,
        expected,
      })
    }
  }
}

/// Operator-facing warning; never blocks a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResalePriceMismatch {
  pub stored: i64,
  pub expected: i64,
}

/// A status write. With `expected_status` set the store applies it only if the
/// order is still in that status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
  pub status: OrderStatus,
  pub payment_status: Option<PaymentStatus>,
  pub expected_status: Option<OrderStatus>,
}

impl StatusUpdate {
  pub fn to(status: OrderStatus) -> Self {
    Self {
      status,
      payment_status: None,
      expected_status: None,
    }
  }

  pub fn with_payment(mut self, payment_status: PaymentStatus) -> Self {
    self.payment_status = Some(payment_status);
    self
  }

  pub fn expecting(mut self, current: OrderStatus) -> Self {
    self.expected_status = Some(current);
    self
  }
}

/// Operator listing filter. `search` matches username or order id, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
  pub status: Option<OrderStatus>,
  pub search: Option<String>,
  pub limit: Option<usize>,
}

impl OrderFilter {
  pub fn matches(&self, order: &Order) -> bool {
    if let Some(status) = self.status {
      if order.status != status {
        return false;
      }
    }
    match self.search.as_deref().map(str::trim) {
      Some(needle) if !needle.is_empty() => {
        let needle = needle.to_lowercase();
        order.buyer.username.to_lowercase().contains(&needle) || order.id.to_string().contains(&needle)
      }
      _ => true,
    }
  }
}
