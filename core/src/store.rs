// topup_core/src/store.rs

//! Persistence boundary for orders, plus an in-memory reference store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{TopupError, TopupResult};
use crate::order::{NewOrder, Order, OrderFilter, OrderId, StatusUpdate};

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Persists a new order in `PENDING_PAYMENT` / `UNSET` and assigns its id.
  async fn create_order(&self, new_order: NewOrder) -> TopupResult<Order>;

  async fn get_order(&self, id: OrderId) -> TopupResult<Option<Order>>;

  /// Orders placed under `username`, newest first, at most `limit` of them.
  async fn list_orders_for_user(&self, username: &str, limit: usize) -> TopupResult<Vec<Order>>;

  /// All orders matching `filter`, newest first.
  async fn list_orders(&self, filter: &OrderFilter) -> TopupResult<Vec<Order>>;

  /// Fails with `NotFound` for an unknown id and with `Conflict` when
  /// `update.expected_status` no longer holds.
  async fn update_order_status(&self, id: OrderId, update: StatusUpdate) -> TopupResult<Order>;
}

#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
  orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.orders.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.orders.read().is_empty()
  }

  /// Inserts or replaces a record as-is. Meant for seeding fixtures.
  pub fn insert(&self, order: Order) {
    self.orders.write().insert(order.id, order);
  }

  fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    orders
  }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
  #[instrument(name = "memory_store::create_order", skip_all, fields(username = %new_order.buyer.username))]
  async fn create_order(&self, new_order: NewOrder) -> TopupResult<Order> {
    let order = Order::from_new(Uuid::new_v4(), new_order, Utc::now());
    self.orders.write().insert(order.id, order.clone());
    debug!(order_id = %order.id, "Order stored in memory.");
    Ok(order)
  }

  async fn get_order(&self, id: OrderId) -> TopupResult<Option<Order>> {
    Ok(self.orders.read().get(&id).cloned())
  }

  async fn list_orders_for_user(&self, username: &str, limit: usize) -> TopupResult<Vec<Order>> {
    let matching = self
      .orders
      .read()
      .values()
      .filter(|order| order.buyer.username == username)
      .cloned()
      .collect();
    let mut orders = Self::newest_first(matching);
    orders.truncate(limit);
    Ok(orders)
  }

  async fn list_orders(&self, filter: &OrderFilter) -> TopupResult<Vec<Order>> {
    let matching = self
      .orders
      .read()
      .values()
      .filter(|order| filter.matches(order))
      .cloned()
      .collect();
    let mut orders = Self::newest_first(matching);
    if let Some(limit) = filter.limit {
      orders.truncate(limit);
    }
    Ok(orders)
  }

  async fn update_order_status(&self, id: OrderId, update: StatusUpdate) -> TopupResult<Order> {
    let mut guard = self.orders.write();
    let order = guard.get_mut(&id).ok_or_else(|| TopupError::NotFound {
      order_id: id.to_string(),
    })?;

    if let Some(expected) = update.expected_status {
      if order.status != expected {
        return Err(TopupError::Conflict {
          order_id: id,
          expected,
          current: order.status,
        });
      }
    }

    order.status = update.status;
    if let Some(payment_status) = update.payment_status {
      order.payment_status = payment_status;
    }
    order.updated_at = Utc::now();
    Ok(order.clone())
  }
}
