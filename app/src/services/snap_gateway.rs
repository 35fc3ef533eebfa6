// topup_app/src/services/snap_gateway.rs

//! Midtrans Snap adapter: `POST /snap/v1/transactions`, Basic auth with the
//! server key as username and an empty password.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use topup_core::{MethodConfig, PaymentArtifact, PaymentGateway, TopupError, TopupResult, TransactionRequest};
use tracing::{debug, instrument, warn};

pub const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";
pub const PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

pub struct SnapGateway {
  client: reqwest::Client,
  base_url: String,
  server_key: String,
}

impl SnapGateway {
  pub fn new(server_key: impl Into<String>, is_production: bool, timeout: Duration) -> anyhow::Result<Self> {
    let base_url = if is_production {
      PRODUCTION_BASE_URL
    } else {
      SANDBOX_BASE_URL
    };
    Self::with_base_url(server_key, base_url, timeout)
  }

  pub fn with_base_url(server_key: impl Into<String>, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      server_key: server_key.into(),
    })
  }
}

#[derive(Debug, Serialize)]
struct TransactionDetails {
  order_id: String,
  gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapItem<'a> {
  id: &'a str,
  price: i64,
  quantity: u32,
  name: &'a str,
}

#[derive(Debug, Serialize)]
struct SnapCustomer<'a> {
  first_name: &'a str,
  email: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  phone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SnapTransaction<'a> {
  transaction_details: TransactionDetails,
  customer_details: SnapCustomer<'a>,
  item_details: Vec<SnapItem<'a>>,
  enabled_payments: &'a [String],
  #[serde(skip_serializing_if = "Option::is_none")]
  bank_transfer: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  permata_va: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  echannel: Option<Value>,
}

impl<'a> SnapTransaction<'a> {
  fn from_request(request: &'a TransactionRequest) -> Self {
    let mut body = SnapTransaction {
      transaction_details: TransactionDetails {
        order_id: request.order_id.to_string(),
        gross_amount: request.gross_amount,
      },
      customer_details: SnapCustomer {
        first_name: &request.customer.first_name,
        email: &request.customer.email,
        phone: request.customer.phone.as_deref(),
      },
      item_details: request
        .line_items
        .iter()
        .map(|item| SnapItem {
          id: &item.id,
          price: item.price,
          quantity: item.quantity,
          name: &item.name,
        })
        .collect(),
      enabled_payments: &request.channel.enabled_payments,
      bank_transfer: None,
      permata_va: None,
      echannel: None,
    };
    match &request.channel.method_config {
      Some(MethodConfig::BankTransfer { bank }) => body.bank_transfer = Some(serde_json::json!({ "bank": bank })),
      Some(MethodConfig::PermataVa { recipient_name }) => {
        body.permata_va = Some(serde_json::json!({ "recipient_name": recipient_name }))
      }
      Some(MethodConfig::Echannel { bill_info1, bill_info2 }) => {
        body.echannel = Some(serde_json::json!({ "bill_info1": bill_info1, "bill_info2": bill_info2 }))
      }
      None => {}
    }
    body
  }
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
  token: Option<String>,
  redirect_url: Option<String>,
  #[serde(default)]
  error_messages: Vec<String>,
}

#[async_trait]
impl PaymentGateway for SnapGateway {
  fn name(&self) -> &'static str {
    "midtrans_snap"
  }

  #[instrument(name = "snap_gateway::create_transaction", skip_all, fields(order_id = %request.order_id, gross_amount = request.gross_amount), err(Display))]
  async fn create_transaction(&self, request: &TransactionRequest) -> TopupResult<PaymentArtifact> {
    let body = SnapTransaction::from_request(request);
    let response = self
      .client
      .post(format!("{}/snap/v1/transactions", self.base_url))
      .basic_auth(&self.server_key, Some(""))
      .json(&body)
      .send()
      .await
      .map_err(|e| TopupError::gateway_from("Snap request failed", e))?;

    let status = response.status();
    let parsed: SnapResponse = response
      .json()
      .await
      .map_err(|e| TopupError::gateway_from(format!("Snap answered {} with an unreadable body", status), e))?;
    debug!(%status, "Snap responded.");

    match (status.is_success(), parsed.token, parsed.redirect_url) {
      (true, Some(token), Some(redirect_url)) => Ok(PaymentArtifact { token, redirect_url }),
      (_, _, _) => {
        let detail = if parsed.error_messages.is_empty() {
          "no token in response".to_string()
        } else {
          parsed.error_messages.join("; ")
        };
        warn!(%status, %detail, "Snap rejected the transaction.");
        Err(TopupError::gateway(format!("Snap returned {}: {}", status, detail)))
      }
    }
  }
}
