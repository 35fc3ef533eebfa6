// topup_app/src/services/payment_mock.rs
use async_trait::async_trait;
use std::time::Duration;
use topup_core::{PaymentArtifact, PaymentGateway, TopupError, TopupResult, TransactionRequest};
use tracing::{info, instrument};
use uuid::Uuid;

/// Stand-in for the hosted checkout when no gateway credentials are configured.
#[derive(Debug, Clone)]
pub struct MockGateway {
  latency: Duration,
  base_url: String,
}

impl MockGateway {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      latency: Duration::from_millis(50),
      base_url: base_url.into(),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  #[instrument(name = "mock_gateway::create_transaction", skip_all, fields(order_id = %request.order_id, gross_amount = request.gross_amount))]
  async fn create_transaction(&self, request: &TransactionRequest) -> TopupResult<PaymentArtifact> {
    // Simulate gateway-side parameter validation
    if request.gross_amount <= 0 {
      return Err(TopupError::gateway("transaction_details.gross_amount must be greater than zero"));
    }
    if request.line_items_total() != request.gross_amount {
      return Err(TopupError::gateway("item_details total does not match gross_amount"));
    }
    tokio::time::sleep(self.latency).await; // Simulate network latency

    let token = format!("mock_snap_{}", Uuid::new_v4().simple());
    info!(channels = ?request.channel.enabled_payments, "Simulated payment transaction created.");
    Ok(PaymentArtifact {
      redirect_url: format!("{}/mock-pay/{}", self.base_url.trim_end_matches('/'), token),
      token,
    })
  }
}
