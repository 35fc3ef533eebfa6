// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use topup_core::{
  CreateOrderRequest, InMemoryOrderStore, NewOrder, Notifier, Order, OrderEvent, OrderFilter, OrderId, OrderService,
  OrderStore, PaymentArtifact, PaymentGateway, PricingConfig, PricingEngine, ServiceSettings, StatusUpdate, TopupError,
  TopupResult, TransactionRequest,
};
use tracing::Level;

// --- Notifier that remembers every event ---
#[derive(Default)]
pub struct RecordingNotifier {
  events: Mutex<Vec<(OrderId, OrderEvent)>>,
  fail: bool,
}

impl RecordingNotifier {
  pub fn failing() -> Self {
    Self {
      events: Mutex::new(Vec::new()),
      fail: true,
    }
  }

  pub fn events(&self) -> Vec<(OrderId, OrderEvent)> {
    self.events.lock().clone()
  }

  pub fn count(&self, order_id: OrderId, event: OrderEvent) -> usize {
    self
      .events
      .lock()
      .iter()
      .filter(|(id, e)| *id == order_id && *e == event)
      .count()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn notify(&self, order: &Order, event: OrderEvent) -> anyhow::Result<()> {
    self.events.lock().push((order.id, event));
    if self.fail {
      anyhow::bail!("notification channel down");
    }
    Ok(())
  }
}

// --- Gateway whose behaviour each test picks ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
  Succeed,
  Reject,
  Hang,
}

pub struct ScriptedGateway {
  mode: GatewayMode,
  requests: Mutex<Vec<TransactionRequest>>,
  calls: AtomicUsize,
}

impl ScriptedGateway {
  pub fn new(mode: GatewayMode) -> Self {
    Self {
      mode,
      requests: Mutex::new(Vec::new()),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<TransactionRequest> {
    self.requests.lock().last().cloned()
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  fn name(&self) -> &'static str {
    "scripted"
  }

  async fn create_transaction(&self, request: &TransactionRequest) -> TopupResult<PaymentArtifact> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.requests.lock().push(request.clone());
    match self.mode {
      GatewayMode::Succeed => Ok(PaymentArtifact {
        token: format!("tok-{}", request.order_id),
        redirect_url: format!("https://pay.test/{}", request.order_id),
      }),
      GatewayMode::Reject => Err(TopupError::gateway("transaction_details.gross_amount is invalid")),
      GatewayMode::Hang => {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(TopupError::gateway("unreachable"))
      }
    }
  }
}

// --- Store that yields around reads so concurrent callers interleave ---
pub struct YieldingStore {
  inner: Arc<InMemoryOrderStore>,
  updates: AtomicUsize,
  conflicts: AtomicUsize,
}

impl YieldingStore {
  pub fn new(inner: Arc<InMemoryOrderStore>) -> Self {
    Self {
      inner,
      updates: AtomicUsize::new(0),
      conflicts: AtomicUsize::new(0),
    }
  }

  pub fn updates(&self) -> usize {
    self.updates.load(Ordering::SeqCst)
  }

  pub fn conflicts(&self) -> usize {
    self.conflicts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl OrderStore for YieldingStore {
  async fn create_order(&self, new_order: NewOrder) -> TopupResult<Order> {
    self.inner.create_order(new_order).await
  }

  async fn get_order(&self, id: OrderId) -> TopupResult<Option<Order>> {
    tokio::task::yield_now().await;
    let order = self.inner.get_order(id).await;
    tokio::task::yield_now().await;
    order
  }

  async fn list_orders_for_user(&self, username: &str, limit: usize) -> TopupResult<Vec<Order>> {
    self.inner.list_orders_for_user(username, limit).await
  }

  async fn list_orders(&self, filter: &OrderFilter) -> TopupResult<Vec<Order>> {
    self.inner.list_orders(filter).await
  }

  async fn update_order_status(&self, id: OrderId, update: StatusUpdate) -> TopupResult<Order> {
    self.updates.fetch_add(1, Ordering::SeqCst);
    let result = self.inner.update_order_status(id, update).await;
    if matches!(result, Err(TopupError::Conflict { .. })) {
      self.conflicts.fetch_add(1, Ordering::SeqCst);
    }
    result
  }
}

// --- Wiring ---
pub struct Harness {
  pub service: OrderService,
  pub store: Arc<InMemoryOrderStore>,
  pub gateway: Arc<ScriptedGateway>,
  pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(mode: GatewayMode) -> Harness {
  harness_with(mode, RecordingNotifier::default(), PricingConfig::default())
}

pub fn harness_with(mode: GatewayMode, notifier: RecordingNotifier, pricing: PricingConfig) -> Harness {
  setup_tracing();
  let store = Arc::new(InMemoryOrderStore::new());
  let gateway = Arc::new(ScriptedGateway::new(mode));
  let notifier = Arc::new(notifier);
  let settings = ServiceSettings {
    gateway_timeout: Duration::from_millis(100),
    status_page_size: 3,
    max_transition_attempts: 3,
  };
  let service = OrderService::new(
    store.clone(),
    gateway.clone(),
    notifier.clone(),
    PricingEngine::new(pricing),
    settings,
  );
  Harness {
    service,
    store,
    gateway,
    notifier,
  }
}

/// Same wiring as [`harness`], but reads go through a [`YieldingStore`].
pub fn yielding_harness() -> (Harness, Arc<YieldingStore>) {
  setup_tracing();
  let store = Arc::new(InMemoryOrderStore::new());
  let yielding = Arc::new(YieldingStore::new(store.clone()));
  let gateway = Arc::new(ScriptedGateway::new(GatewayMode::Succeed));
  let notifier = Arc::new(RecordingNotifier::default());
  let service = OrderService::new(
    yielding.clone(),
    gateway.clone(),
    notifier.clone(),
    PricingEngine::new(PricingConfig::default()),
    ServiceSettings {
      gateway_timeout: Duration::from_millis(100),
      status_page_size: 3,
      max_transition_attempts: 3,
    },
  );
  (
    Harness {
      service,
      store,
      gateway,
      notifier,
    },
    yielding,
  )
}

pub fn order_request(amount: u32, method: &str) -> CreateOrderRequest {
  CreateOrderRequest {
    username: "builderman".to_string(),
    user_id: "156".to_string(),
    email: "builder@example.com".to_string(),
    amount,
    payment_method: method.to_string(),
    whatsapp: Some("081234567890".to_string()),
    gamepass_link: Some("https://www.roblox.com/game-pass/123456/topup".to_string()),
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
