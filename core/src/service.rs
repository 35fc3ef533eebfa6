// topup_core/src/service.rs

//! Order creation, payment reconciliation and operator actions.
//!
//! `OrderService` is the only place that performs side effects on behalf of the
//! state machine. Each entry point handles one inbound trigger; no lock or
//! cached status is held across an `.await`. Status writes go through the
//! store's guarded update, so two racing callbacks for the same order resolve
//! to one applied transition and one `AlreadyApplied`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{TopupError, TopupResult};
use crate::gateway::{GatewayNotification, PaymentArtifact, PaymentGateway, TransactionRequest};
use crate::lifecycle::{transition, Effect, OperatorAction, Transition, Trigger, Unchanged};
use crate::notifier::{notify_best_effort, Notifier, OrderEvent};
use crate::order::{Buyer, NewOrder, Order, OrderFilter, OrderId, OrderStatus, PaymentStatus, ResalePriceMismatch, StatusUpdate};
use crate::pricing::{PriceQuote, PricingEngine, UnknownMethodPolicy, MIN_TOPUP_AMOUNT};
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
  pub gateway_timeout: Duration,
  /// Cap on the buyer-facing status listing.
  pub status_page_size: usize,
  /// Re-read/re-decide rounds when a guarded status write loses a race.
  pub max_transition_attempts: u32,
}

impl Default for ServiceSettings {
  fn default() -> Self {
    Self {
      gateway_timeout: Duration::from_secs(10),
      status_page_size: 10,
      max_transition_attempts: 3,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct CreateOrderRequest {
  #[validate(length(min = 1, message = "username is required"))]
  pub username: String,
  pub user_id: String,
  #[validate(email(message = "email is not valid"))]
  pub email: String,
  #[validate(range(min = MIN_TOPUP_AMOUNT, message = "amount must be at least 100"))]
  pub amount: u32,
  #[validate(length(min = 1, message = "paymentMethod is required"))]
  pub payment_method: String,
  pub whatsapp: Option<String>,
  pub gamepass_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
  pub order: Order,
  pub quote: PriceQuote,
  pub payment: PaymentArtifact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
  Applied(Order),
  Unchanged { order_id: OrderId, reason: Unchanged },
  /// Unknown or unparseable order id. Acknowledged; the gateway may redeliver.
  OrderNotFound { order_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorOrderView {
  #[serde(flatten)]
  pub order: Order,
  pub resale_price_warning: Option<ResalePriceMismatch>,
}

pub struct OrderService {
  store: Arc<dyn OrderStore>,
  gateway: Arc<dyn PaymentGateway>,
  notifier: Arc<dyn Notifier>,
  pricing: PricingEngine,
  settings: ServiceSettings,
}

impl OrderService {
  pub fn new(
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    pricing: PricingEngine,
    settings: ServiceSettings,
  ) -> Self {
    Self {
      store,
      gateway,
      notifier,
      pricing,
      settings,
    }
  }

  /// Rejects malformed input before anything is persisted or sent out.
  pub fn validate_request(&self, request: &CreateOrderRequest) -> TopupResult<()> {
    request.validate()?;

    if request.username.trim().is_empty() {
      return Err(TopupError::Validation("username is required".to_string()));
    }
    if request.user_id.is_empty() || !request.user_id.chars().all(|c| c.is_ascii_digit()) {
      return Err(TopupError::Validation("userId must be numeric".to_string()));
    }
    if request.payment_method.trim().is_empty() {
      return Err(TopupError::Validation("paymentMethod is required".to_string()));
    }
    if !self.pricing.knows_method(&request.payment_method)
      && self.pricing.config().unknown_method_policy == UnknownMethodPolicy::Reject
    {
      return Err(TopupError::Validation(format!(
        "unsupported payment method '{}'",
        request.payment_method
      )));
    }
    Ok(())
  }

  /// Persists the order first, then asks the gateway for a payment artifact.
  /// A gateway failure leaves the order in `PENDING_PAYMENT`.
  #[instrument(
    name = "order_service::create_order",
    skip_all,
    fields(username = %request.username, amount = request.amount, method = %request.payment_method),
    err(Display)
  )]
  pub async fn create_order(&self, request: CreateOrderRequest) -> TopupResult<CreatedOrder> {
    self.validate_request(&request)?;
    let quote = self.quote(&request);
    let order = self.record_order(request, quote).await?;
    self.announce_new_order(&order).await;
    let payment = self.open_transaction(&order, &quote).await?;
    Ok(CreatedOrder { order, quote, payment })
  }

  pub fn quote(&self, request: &CreateOrderRequest) -> PriceQuote {
    if !self.pricing.knows_method(&request.payment_method) {
      warn!(
        method = %request.payment_method,
        "No fee rule for payment method; charging zero admin fee."
      );
    }
    self.pricing.quote(request.amount, &request.payment_method)
  }

  /// Writes the `PENDING_PAYMENT` record. Nothing has been sent out yet.
  pub async fn record_order(&self, request: CreateOrderRequest, quote: PriceQuote) -> TopupResult<Order> {
    let new_order = NewOrder {
      amount: request.amount,
      buyer: Buyer {
        username: request.username.trim().to_string(),
        user_id: request.user_id,
        email: request.email,
        whatsapp: request.whatsapp.filter(|w| !w.trim().is_empty()),
      },
      gamepass_link: request.gamepass_link.filter(|l| !l.trim().is_empty()),
      payment_method: request.payment_method,
      quote,
    };
    let order = self.store.create_order(new_order).await?;
    info!(
      order_id = %order.id,
      base_price = quote.base_price,
      admin_fee = quote.admin_fee,
      gross_amount = quote.gross_amount,
      resale_price = quote.resale_price,
      "Order recorded; awaiting payment."
    );
    Ok(order)
  }

  pub async fn announce_new_order(&self, order: &Order) {
    notify_best_effort(self.notifier.as_ref(), order, OrderEvent::NewOrder).await;
  }

  /// Bounded by the configured gateway timeout. The order stays pending on
  /// any failure so the buyer can retry.
  pub async fn open_transaction(&self, order: &Order, quote: &PriceQuote) -> TopupResult<PaymentArtifact> {
    let transaction = TransactionRequest::for_order(order, quote);
    if transaction.line_items_total() != transaction.gross_amount {
      return Err(TopupError::Internal(format!(
        "line items total {} does not match gross amount {} for order {}",
        transaction.line_items_total(),
        transaction.gross_amount,
        order.id
      )));
    }

    let payment = self.call_gateway(&transaction).await.map_err(|e| {
      warn!(order_id = %order.id, error = %e, "Gateway call failed; order left pending for recovery.");
      e
    })?;
    info!(order_id = %order.id, gateway = self.gateway.name(), "Payment transaction opened.");
    Ok(payment)
  }

  async fn call_gateway(&self, transaction: &TransactionRequest) -> TopupResult<PaymentArtifact> {
    match tokio::time::timeout(self.settings.gateway_timeout, self.gateway.create_transaction(transaction)).await {
      Ok(Ok(artifact)) => Ok(artifact),
      Ok(Err(e @ TopupError::Gateway { .. })) => Err(e),
      Ok(Err(other)) => Err(TopupError::gateway_from("gateway adapter failed", other)),
      Err(_) => Err(TopupError::gateway(format!(
        "gateway did not answer within {} ms",
        self.settings.gateway_timeout.as_millis()
      ))),
    }
  }

  /// Maps a gateway notification onto the state machine.
  ///
  /// Only store failures surface as `Err`; unknown orders and ignored statuses
  /// are acknowledged outcomes.
  #[instrument(
    name = "order_service::handle_notification",
    skip_all,
    fields(order_id = %notification.order_id, transaction_status = ?notification.transaction_status, fraud_status = ?notification.fraud_status),
    err(Display)
  )]
  pub async fn handle_notification(&self, notification: &GatewayNotification) -> TopupResult<CallbackOutcome> {
    let signal = notification.signal();
    let order_id = match Uuid::parse_str(notification.order_id.trim()) {
      Ok(id) => id,
      Err(_) => {
        warn!("Notification carries a malformed order id; acknowledging without action.");
        return Ok(CallbackOutcome::OrderNotFound {
          order_id: notification.order_id.clone(),
        });
      }
    };

    for attempt in 1..=self.settings.max_transition_attempts {
      let Some(order) = self.store.get_order(order_id).await? else {
        warn!("Notification for an order not in the store; the gateway may redeliver.");
        return Ok(CallbackOutcome::OrderNotFound {
          order_id: notification.order_id.clone(),
        });
      };

      match transition(order.status, Trigger::Payment(signal)) {
        Transition::Unchanged(reason) => {
          log_unchanged(&order, reason);
          return Ok(CallbackOutcome::Unchanged { order_id, reason });
        }
        Transition::Changed { from, to, effects } => match self.apply_effects(order_id, from, effects).await {
          Ok(updated) => {
            info!(%from, %to, "Payment notification applied.");
            return Ok(CallbackOutcome::Applied(updated));
          }
          Err(TopupError::Conflict { current, .. }) => {
            debug!(attempt, %current, "Status moved underneath the notification; re-deciding.");
          }
          Err(TopupError::NotFound { .. }) => {
            return Ok(CallbackOutcome::OrderNotFound {
              order_id: notification.order_id.clone(),
            });
          }
          Err(e) => return Err(e),
        },
      }
    }

    Err(TopupError::Internal(format!(
      "order {} kept changing status during reconciliation",
      order_id
    )))
  }

  /// Operator-driven fulfilment steps and the manual `revise` correction.
  #[instrument(name = "order_service::apply_operator_action", skip(self), err(Display))]
  pub async fn apply_operator_action(&self, order_id: OrderId, action: OperatorAction) -> TopupResult<Order> {
    for attempt in 1..=self.settings.max_transition_attempts {
      let order = self.order(order_id).await?;

      match transition(order.status, Trigger::Operator(action)) {
        Transition::Unchanged(Unchanged::AlreadyApplied) => {
          debug!(status = %order.status, "Operator action already applied.");
          return Ok(order);
        }
        Transition::Unchanged(_) => {
          return Err(TopupError::InvalidTransition {
            order_id,
            action: action.as_str(),
            current: order.status,
          });
        }
        Transition::Changed { from, to, effects } => {
          if action == OperatorAction::Revise && order.payment_status != PaymentStatus::Paid {
            warn!(payment_status = %order.payment_status, "Revising an order that was never paid.");
          }
          match self.apply_effects(order_id, from, effects).await {
            Ok(updated) => {
              info!(%from, %to, "Operator action applied.");
              return Ok(updated);
            }
            Err(TopupError::Conflict { current, .. }) => {
              debug!(attempt, %current, "Status moved underneath the operator action; re-deciding.");
            }
            Err(e) => return Err(e),
          }
        }
      }
    }

    Err(TopupError::Internal(format!(
      "order {} kept changing status during operator action",
      order_id
    )))
  }

  // Persist always precedes Notify in a transition's effect list.
  async fn apply_effects(&self, order_id: OrderId, from: OrderStatus, effects: Vec<Effect>) -> TopupResult<Order> {
    let mut persisted: Option<Order> = None;
    for effect in effects {
      match effect {
        Effect::Persist { status, payment_status } => {
          let mut update = StatusUpdate::to(status).expecting(from);
          if let Some(payment_status) = payment_status {
            update = update.with_payment(payment_status);
          }
          persisted = Some(self.store.update_order_status(order_id, update).await?);
        }
        Effect::Notify(event) => {
          if let Some(order) = &persisted {
            notify_best_effort(self.notifier.as_ref(), order, event).await;
          }
        }
      }
    }
    persisted.ok_or_else(|| TopupError::Internal(format!("transition for order {} persisted nothing", order_id)))
  }

  pub async fn order(&self, order_id: OrderId) -> TopupResult<Order> {
    self.store.get_order(order_id).await?.ok_or_else(|| TopupError::NotFound {
      order_id: order_id.to_string(),
    })
  }

  /// Buyer status page: newest first, capped at the configured page size.
  #[instrument(name = "order_service::orders_for_user", skip(self))]
  pub async fn orders_for_user(&self, username: &str) -> TopupResult<Vec<Order>> {
    let username = username.trim();
    if username.is_empty() {
      return Err(TopupError::Validation("username is required".to_string()));
    }
    self
      .store
      .list_orders_for_user(username, self.settings.status_page_size)
      .await
  }

  /// Operator listing with the resale-price consistency warning attached.
  pub async fn operator_orders(&self, filter: &OrderFilter) -> TopupResult<Vec<OperatorOrderView>> {
    let orders = self.store.list_orders(filter).await?;
    Ok(
      orders
        .into_iter()
        .map(|order| {
          let resale_price_warning = order.resale_price_check(&self.pricing);
          if let Some(mismatch) = resale_price_warning {
            warn!(
              order_id = %order.id,
              stored = mismatch.stored,
              expected = mismatch.expected,
              "Stored resale price differs from the expected one."
            );
          }
          OperatorOrderView {
            order,
            resale_price_warning,
          }
        })
        .collect(),
    )
  }
}

fn log_unchanged(order: &Order, reason: Unchanged) {
  match reason {
    Unchanged::AlreadyApplied => debug!(status = %order.status, "Duplicate notification; nothing to do."),
    Unchanged::AwaitingFraudReview => info!("Capture held for fraud review; waiting for a final status."),
    Unchanged::AwaitingPayment => debug!("Transaction still pending."),
    Unchanged::UnrecognizedStatus => warn!("Unrecognized transaction status; ignoring."),
    Unchanged::OutOfOrder { current } => {
      warn!(%current, "Gateway outcome arrived after the order moved on; ignoring.")
    }
    Unchanged::NotAllowed { current } => warn!(%current, "Transition not allowed; ignoring."),
  }
}
