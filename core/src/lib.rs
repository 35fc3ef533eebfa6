// src/lib.rs

//! topup-core: the order lifecycle behind a gamepass-based virtual currency top-up shop.
//!
//!  - [`pricing`]: base price, admin fee and resale price from an injected fee schedule.
//!  - [`lifecycle`]: the order state machine as one pure transition function.
//!  - [`service`]: order creation, gateway-notification reconciliation and operator actions.
//!  - [`store`], [`gateway`], [`notifier`]: the boundaries the service drives.

pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod notifier;
pub mod order;
pub mod pricing;
pub mod service;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::error::{TopupError, TopupResult};
pub use crate::gateway::{
  CustomerDetails, FraudStatus, GatewayNotification, LineItem, MethodConfig, PaymentArtifact, PaymentChannel,
  PaymentGateway, TransactionRequest, TransactionStatus,
};
pub use crate::lifecycle::{transition, Effect, OperatorAction, PaymentSignal, Transition, Trigger, Unchanged};
pub use crate::notifier::{notify_best_effort, Notifier, OrderEvent, TracingNotifier};
pub use crate::order::{
  Buyer, NewOrder, Order, OrderFilter, OrderId, OrderStatus, PaymentStatus, ResalePriceMismatch, StatusUpdate,
};
pub use crate::pricing::{
  FeeRule, FeeSchedule, PriceQuote, PricingConfig, PricingEngine, UnknownMethodPolicy, MIN_TOPUP_AMOUNT,
};
pub use crate::service::{CallbackOutcome, CreateOrderRequest, CreatedOrder, OperatorOrderView, OrderService, ServiceSettings};
pub use crate::store::{InMemoryOrderStore, OrderStore};
