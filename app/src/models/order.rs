// topup_app/src/models/order.rs

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use topup_core::{Buyer, Order, OrderStatus, PaymentStatus, TopupError};
use uuid::Uuid;

/// One row of the `orders` table. Statuses are stored as their wire strings.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRecord {
  pub id: Uuid,
  pub amount: i64,
  pub buyer_username: String,
  pub buyer_user_id: String,
  pub email: String,
  pub whatsapp: Option<String>,
  pub gamepass_link: Option<String>,
  pub payment_method: String,
  pub base_price: i64,
  pub admin_fee: i64,
  pub gross_amount: i64,
  pub resale_price: i64,
  pub status: String,
  pub payment_status: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
  type Error = TopupError;

  fn try_from(row: OrderRecord) -> Result<Self, Self::Error> {
    let corrupt = |what: String| TopupError::Internal(format!("order {} has {}", row.id, what));
    let status = row.status.parse::<OrderStatus>().map_err(corrupt)?;
    let payment_status = row.payment_status.parse::<PaymentStatus>().map_err(corrupt)?;
    let amount = u32::try_from(row.amount).map_err(|_| corrupt(format!("an out-of-range amount {}", row.amount)))?;

    Ok(Order {
      id: row.id,
      amount,
      buyer: Buyer {
        username: row.buyer_username,
        user_id: row.buyer_user_id,
        email: row.email,
        whatsapp: row.whatsapp,
      },
      gamepass_link: row.gamepass_link,
      payment_method: row.payment_method,
      base_price: row.base_price,
      admin_fee: row.admin_fee,
      gross_amount: row.gross_amount,
      resale_price: row.resale_price,
      status,
      payment_status,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}
