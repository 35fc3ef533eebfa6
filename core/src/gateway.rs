// topup_core/src/gateway.rs

//! Boundary to the external payment gateway: outbound transaction creation and
//! the inbound notification payload.

use async_trait::async_trait;
use serde::de::{Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize};

use crate::error::TopupResult;
use crate::lifecycle::PaymentSignal;
use crate::order::{Order, OrderId};
use crate::pricing::PriceQuote;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
  pub id: String,
  pub name: String,
  pub price: i64,
  pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerDetails {
  pub first_name: String,
  pub email: String,
  pub phone: Option<String>,
}

/// Channel-specific parameters some payment methods need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodConfig {
  BankTransfer { bank: String },
  PermataVa { recipient_name: String },
  Echannel { bill_info1: String, bill_info2: String },
}

/// Which gateway channels the payer may use, derived from the chosen method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentChannel {
  pub enabled_payments: Vec<String>,
  pub method_config: Option<MethodConfig>,
}

impl PaymentChannel {
  pub fn for_method(payment_method: &str, buyer_username: &str) -> Self {
    let only = |channel: &str| PaymentChannel {
      enabled_payments: vec![channel.to_string()],
      method_config: None,
    };
    match payment_method {
      "qris" | "dana" | "ovo" => only("qris"),
      "gopay" => only("gopay"),
      "shopeepay" => only("shopeepay"),
      "bca" | "bri" | "bni" => PaymentChannel {
        enabled_payments: vec![format!("{}_va", payment_method)],
        method_config: Some(MethodConfig::BankTransfer {
          bank: payment_method.to_string(),
        }),
      },
      "permata" => PaymentChannel {
        enabled_payments: vec!["permata_va".to_string()],
        method_config: Some(MethodConfig::PermataVa {
          recipient_name: buyer_username.to_string(),
        }),
      },
      "mandiri" => PaymentChannel {
        enabled_payments: vec!["echannel".to_string()],
        method_config: Some(MethodConfig::Echannel {
          bill_info1: "Topup".to_string(),
          bill_info2: "Gamepass Topup".to_string(),
        }),
      },
      _ => only("other_qris"),
    }
  }
}

/// What the gateway needs to open a transaction. Its transaction id is the order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
  pub order_id: OrderId,
  pub gross_amount: i64,
  pub customer: CustomerDetails,
  pub line_items: Vec<LineItem>,
  pub channel: PaymentChannel,
}

impl TransactionRequest {
  /// Base amount and admin fee as two line items; they sum to `quote.gross_amount`.
  pub fn for_order(order: &Order, quote: &PriceQuote) -> Self {
    let line_items = vec![
      LineItem {
        id: format!("TOPUP-{}", order.amount),
        name: format!("{} Robux", order.amount),
        price: quote.base_price,
        quantity: 1,
      },
      LineItem {
        id: format!("FEE-{}", order.payment_method),
        name: "Service fee".to_string(),
        price: quote.admin_fee,
        quantity: 1,
      },
    ];
    Self {
      order_id: order.id,
      gross_amount: quote.gross_amount,
      customer: CustomerDetails {
        first_name: order.buyer.username.clone(),
        email: order.buyer.email.clone(),
        phone: order.buyer.whatsapp.clone(),
      },
      line_items,
      channel: PaymentChannel::for_method(&order.payment_method, &order.buyer.username),
    }
  }

  pub fn line_items_total(&self) -> i64 {
    self
      .line_items
      .iter()
      .map(|item| item.price * i64::from(item.quantity))
      .sum()
  }
}

/// Returned to the buyer so they can complete payment out-of-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentArtifact {
  pub token: String,
  pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  fn name(&self) -> &'static str;

  async fn create_transaction(&self, request: &TransactionRequest) -> TopupResult<PaymentArtifact>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  Capture,
  Settlement,
  Pending,
  Cancel,
  Deny,
  Expire,
  #[default]
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudStatus {
  Accept,
  Challenge,
  #[serde(other)]
  Other,
}

/// Inbound gateway notification. Fields beyond the first three are only used
/// for signature verification.
///
/// Parsing never fails on a field's shape: a missing, null or non-string
/// status reads as `Other`, and a non-string order id reads as text that
/// matches no order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
  #[serde(default, deserialize_with = "lenient_text")]
  pub order_id: String,
  #[serde(default, deserialize_with = "lenient_status")]
  pub transaction_status: TransactionStatus,
  #[serde(default, deserialize_with = "lenient_fraud_status")]
  pub fraud_status: Option<FraudStatus>,
  #[serde(default, deserialize_with = "lenient_optional_text")]
  pub status_code: Option<String>,
  #[serde(default, deserialize_with = "lenient_optional_text")]
  pub gross_amount: Option<String>,
  #[serde(default, deserialize_with = "lenient_optional_text")]
  pub signature_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
  Known(T),
  Null(()),
  Unreadable(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
  Text(String),
  Unsigned(u64),
  Signed(i64),
  Float(f64),
  Unreadable(IgnoredAny),
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  Ok(match LooseScalar::deserialize(deserializer)? {
    LooseScalar::Text(text) => Some(text),
    LooseScalar::Unsigned(n) => Some(n.to_string()),
    LooseScalar::Signed(n) => Some(n.to_string()),
    LooseScalar::Float(n) => Some(n.to_string()),
    LooseScalar::Unreadable(_) => None,
  })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  Ok(lenient_optional_text(deserializer)?.unwrap_or_default())
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TransactionStatus, D::Error> {
  Ok(match Loose::<TransactionStatus>::deserialize(deserializer)? {
    Loose::Known(status) => status,
    Loose::Null(()) | Loose::Unreadable(_) => TransactionStatus::Other,
  })
}

fn lenient_fraud_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<FraudStatus>, D::Error> {
  Ok(match Loose::<FraudStatus>::deserialize(deserializer)? {
    Loose::Known(status) => Some(status),
    Loose::Null(()) => None,
    Loose::Unreadable(_) => Some(FraudStatus::Other),
  })
}

impl GatewayNotification {
  pub fn new(order_id: impl Into<String>, transaction_status: TransactionStatus) -> Self {
    Self {
      order_id: order_id.into(),
      transaction_status,
      fraud_status: None,
      status_code: None,
      gross_amount: None,
      signature_key: None,
    }
  }

  pub fn with_fraud_status(mut self, fraud_status: FraudStatus) -> Self {
    self.fraud_status = Some(fraud_status);
    self
  }

  /// Fraud status only matters for `capture`.
  pub fn signal(&self) -> PaymentSignal {
    match (self.transaction_status, self.fraud_status) {
      (TransactionStatus::Capture, Some(FraudStatus::Accept)) => PaymentSignal::Succeeded,
      (TransactionStatus::Capture, Some(FraudStatus::Challenge)) => PaymentSignal::Challenged,
      (TransactionStatus::Capture, _) => PaymentSignal::Unrecognized,
      (TransactionStatus::Settlement, _) => PaymentSignal::Succeeded,
      (TransactionStatus::Pending, _) => PaymentSignal::Pending,
      (TransactionStatus::Cancel | TransactionStatus::Deny | TransactionStatus::Expire, _) => PaymentSignal::Failed,
      (TransactionStatus::Other, _) => PaymentSignal::Unrecognized,
    }
  }
}
