// topup_app/src/services/discord_notifier.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use topup_core::{Notifier, Order, OrderEvent};
use tracing::{debug, instrument};

const YELLOW: u32 = 16_776_960;
const GREEN: u32 = 3_066_993;
const RED: u32 = 15_158_332;

/// Posts one embed per order event to a Discord channel webhook.
pub struct DiscordNotifier {
  client: reqwest::Client,
  webhook_url: String,
}

impl DiscordNotifier {
  pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
    Ok(Self {
      client: reqwest::Client::builder().timeout(timeout).build()?,
      webhook_url: webhook_url.into(),
    })
  }
}

pub fn embed_for(order: &Order, event: OrderEvent) -> Value {
  let (title, description, color) = match event {
    OrderEvent::NewOrder => ("New order, awaiting payment", "Order placed. Not paid yet.", YELLOW),
    OrderEvent::PaymentSuccess => (
      "PAYMENT SUCCESS, fulfilment pending",
      "**Ready to process.** Buy the listing for this buyer.",
      GREEN,
    ),
    OrderEvent::Failed => ("Order failed or expired", "Payment failed or expired.", RED),
  };

  let contact = order
    .buyer
    .whatsapp
    .as_deref()
    .map(|w| format!("`{}`", w))
    .unwrap_or_else(|| "-".to_string());
  let listing = order
    .gamepass_link
    .as_deref()
    .map(|l| format!("[Open listing]({})", l))
    .unwrap_or_else(|| "No link".to_string());

  json!({
    "title": title,
    "description": description,
    "color": color,
    "fields": [
      { "name": "Order ID", "value": format!("`{}`", order.id), "inline": true },
      { "name": "Username", "value": format!("**{}**", order.buyer.username), "inline": true },
      { "name": "Amount", "value": format!("{} Robux", order.amount), "inline": true },
      { "name": "Gamepass price", "value": format!("{} Robux", order.resale_price), "inline": true },
      { "name": "WhatsApp", "value": contact, "inline": true },
      { "name": "Status", "value": format!("`{}`", order.status), "inline": true },
      { "name": "Gamepass link", "value": listing },
      {
        "name": "Profile",
        "value": format!("[Open profile](https://www.roblox.com/users/{}/profile)", order.buyer.user_id)
      }
    ],
    "footer": { "text": "Topup System" },
    "timestamp": Utc::now().to_rfc3339()
  })
}

#[async_trait]
impl Notifier for DiscordNotifier {
  #[instrument(name = "discord_notifier::notify", skip_all, fields(order_id = %order.id, event = %event))]
  async fn notify(&self, order: &Order, event: OrderEvent) -> anyhow::Result<()> {
    self
      .client
      .post(&self.webhook_url)
      .json(&json!({ "embeds": [embed_for(order, event)] }))
      .send()
      .await?
      .error_for_status()?;
    debug!("Discord notification delivered.");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use topup_core::{Buyer, NewOrder, PricingEngine};
  use uuid::Uuid;

  fn order() -> Order {
    Order::from_new(
      Uuid::new_v4(),
      NewOrder {
        amount: 700,
        buyer: Buyer {
          username: "builderman".into(),
          user_id: "156".into(),
          email: "builder@example.com".into(),
          whatsapp: Some("0812".into()),
        },
        gamepass_link: None,
        payment_method: "qris".into(),
        quote: PricingEngine::default().quote(700, "qris"),
      },
      Utc::now(),
    )
  }

  #[test]
  fn embed_reflects_event_and_order() {
    let order = order();
    let embed = embed_for(&order, OrderEvent::PaymentSuccess);
    assert_eq!(embed["color"], GREEN);
    let fields = embed["fields"].as_array().unwrap();
    assert_eq!(fields[3]["value"], "1000 Robux");
    assert_eq!(fields[4]["value"], "`0812`");
    assert_eq!(fields[5]["value"], "`PENDING_PAYMENT`");
    assert_eq!(fields[6]["value"], "No link");
    assert!(fields[7]["value"].as_str().unwrap().contains("/users/156/profile"));

    assert_eq!(embed_for(&order, OrderEvent::Failed)["color"], RED);
    assert_eq!(embed_for(&order, OrderEvent::NewOrder)["color"], YELLOW);
  }
}
