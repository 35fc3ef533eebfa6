// topup_app/src/db/pg_order_store.rs

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::OrderRecord;
use topup_core::{NewOrder, Order, OrderFilter, OrderId, OrderStore, StatusUpdate, TopupError, TopupResult};

const ORDER_COLUMNS: &str = "id, amount, buyer_username, buyer_user_id, email, whatsapp, gamepass_link, \
   payment_method, base_price, admin_fee, gross_amount, resale_price, status, payment_status, \
   created_at, updated_at";

/// `OrderStore` over the `orders` table.
#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn migrate(&self) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn fetch(&self, id: OrderId) -> Result<Option<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
  }
}

fn like_pattern(needle: &str) -> String {
  let escaped = needle
    .trim()
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_");
  format!("%{}%", escaped)
}

fn into_orders(rows: Vec<OrderRecord>) -> TopupResult<Vec<Order>> {
  rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(name = "pg_store::create_order", skip_all, fields(username = %new_order.buyer.username), err(Display))]
  async fn create_order(&self, new_order: NewOrder) -> TopupResult<Order> {
    let order = Order::from_new(Uuid::new_v4(), new_order, chrono::Utc::now());
    let row = sqlx::query_as::<_, OrderRecord>(&format!(
      "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
       RETURNING {}",
      ORDER_COLUMNS, ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(i64::from(order.amount))
    .bind(&order.buyer.username)
    .bind(&order.buyer.user_id)
    .bind(&order.buyer.email)
    .bind(&order.buyer.whatsapp)
    .bind(&order.gamepass_link)
    .bind(&order.payment_method)
    .bind(order.base_price)
    .bind(order.admin_fee)
    .bind(order.gross_amount)
    .bind(order.resale_price)
    .bind(order.status.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.created_at)
    .bind(order.updated_at)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| TopupError::store("create_order", e))?;

    debug!(order_id = %row.id, "Order row inserted.");
    Order::try_from(row)
  }

  async fn get_order(&self, id: OrderId) -> TopupResult<Option<Order>> {
    self
      .fetch(id)
      .await
      .map_err(|e| TopupError::store("get_order", e))?
      .map(Order::try_from)
      .transpose()
  }

  async fn list_orders_for_user(&self, username: &str, limit: usize) -> TopupResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRecord>(&format!(
      "SELECT {} FROM orders WHERE buyer_username = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
      ORDER_COLUMNS
    ))
    .bind(username)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(&self.pool)
    .await
    .map_err(|e| TopupError::store("list_orders_for_user", e))?;
    into_orders(rows)
  }

  async fn list_orders(&self, filter: &OrderFilter) -> TopupResult<Vec<Order>> {
    let search = filter
      .search
      .as_deref()
      .filter(|s| !s.trim().is_empty())
      .map(like_pattern);
    let rows = sqlx::query_as::<_, OrderRecord>(&format!(
      "SELECT {} FROM orders \
       WHERE ($1::text IS NULL OR status = $1) \
         AND ($2::text IS NULL OR buyer_username ILIKE $2 OR id::text ILIKE $2) \
       ORDER BY created_at DESC, id DESC LIMIT $3",
      ORDER_COLUMNS
    ))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(search)
    .bind(filter.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
    .fetch_all(&self.pool)
    .await
    .map_err(|e| TopupError::store("list_orders", e))?;
    into_orders(rows)
  }

  // Compare-and-set on status; a miss is told apart by re-reading the row.
  #[instrument(name = "pg_store::update_order_status", skip(self), err(Display))]
  async fn update_order_status(&self, id: OrderId, update: StatusUpdate) -> TopupResult<Order> {
    let updated = sqlx::query_as::<_, OrderRecord>(&format!(
      "UPDATE orders \
       SET status = $2, payment_status = COALESCE($3, payment_status), updated_at = NOW() \
       WHERE id = $1 AND ($4::text IS NULL OR status = $4) \
       RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(id)
    .bind(update.status.as_str())
    .bind(update.payment_status.map(|p| p.as_str()))
    .bind(update.expected_status.map(|s| s.as_str()))
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| TopupError::store("update_order_status", e))?;

    if let Some(row) = updated {
      return Order::try_from(row);
    }

    let current = self
      .fetch(id)
      .await
      .map_err(|e| TopupError::store("update_order_status", e))?
      .map(Order::try_from)
      .transpose()?;
    match (current, update.expected_status) {
      (None, _) => Err(TopupError::NotFound {
        order_id: id.to_string(),
      }),
      (Some(order), Some(expected)) => Err(TopupError::Conflict {
        order_id: id,
        expected,
        current: order.status,
      }),
      (Some(_), None) => Err(TopupError::Internal(format!(
        "unguarded update of order {} matched no row",
        id
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::like_pattern;

  #[test]
  fn search_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("  bob "), "%bob%");
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
  }
}
