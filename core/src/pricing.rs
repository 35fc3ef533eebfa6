// topup_core/src/pricing.rs

//! Price and fee computation for a top-up order.
//!
//! Everything here is pure: the same `(amount, method)` always yields the same
//! [`PriceQuote`]. The fee table and the conversion constants are carried in an
//! immutable [`PricingConfig`] handed to [`PricingEngine::new`], so tests and
//! deployments can swap fee schedules without touching process-wide state.
//!
//! Money is whole units of the local currency (`i64`). Intermediate arithmetic
//! uses `rust_decimal` so that `137.5 * amount` and percentage fees round
//! exactly, half away from zero.

use rust_decimal::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Smallest top-up an order may request.
pub const MIN_TOPUP_AMOUNT: u32 = 100;

/// Flat fee charged by every virtual-account bank channel.
pub const BANK_TRANSFER_FLAT_FEE: i64 = 3000;

/// How a payment method's admin fee is derived from the base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRule {
  Percent { rate: Decimal },
  Flat { value: i64 },
}

impl FeeRule {
  /// `rate_millis` is the percentage as a fraction in thousandths (`7` = 0.007).
  pub fn percent_millis(rate_millis: i64) -> Self {
    FeeRule::Percent {
      rate: Decimal::new(rate_millis, 3),
    }
  }

  pub fn flat(value: i64) -> Self {
    FeeRule::Flat { value }
  }

  fn apply(&self, base_price: i64) -> i64 {
    match self {
      FeeRule::Percent { rate } => round_to_unit(Decimal::from(base_price) * rate),
      FeeRule::Flat { value } => *value,
    }
  }
}

/// Payment method key → fee rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeSchedule {
  rules: BTreeMap<String, FeeRule>,
}

impl FeeSchedule {
  pub fn new() -> Self {
    Self::default()
  }

  /// The production table: e-wallets and QRIS by percentage, bank virtual accounts flat.
  pub fn standard() -> Self {
    Self::new()
      .with_rule("qris", FeeRule::percent_millis(7))
      .with_rule("gopay", FeeRule::percent_millis(20))
      .with_rule("shopeepay", FeeRule::percent_millis(40))
      .with_rule("dana", FeeRule::percent_millis(17))
      .with_rule("ovo", FeeRule::percent_millis(17))
      .with_rule("bca", FeeRule::flat(BANK_TRANSFER_FLAT_FEE))
      .with_rule("bri", FeeRule::flat(BANK_TRANSFER_FLAT_FEE))
      .with_rule("bni", FeeRule::flat(BANK_TRANSFER_FLAT_FEE))
      .with_rule("mandiri", FeeRule::flat(BANK_TRANSFER_FLAT_FEE))
      .with_rule("permata", FeeRule::flat(BANK_TRANSFER_FLAT_FEE))
  }

  pub fn with_rule(mut self, method: impl Into<String>, rule: FeeRule) -> Self {
    self.rules.insert(method.into(), rule);
    self
  }

  pub fn rule_for(&self, method: &str) -> Option<&FeeRule> {
    self.rules.get(method)
  }

  pub fn methods(&self) -> impl Iterator<Item = &str> {
    self.rules.keys().map(String::as_str)
  }
}

/// What order creation does with a method code that has no fee rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownMethodPolicy {
  /// Accept the order and charge no admin fee.
  #[default]
  ZeroFee,
  /// Reject the order as a validation error.
  Reject,
}

impl std::str::FromStr for UnknownMethodPolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "zero_fee" | "zero-fee" => Ok(UnknownMethodPolicy::ZeroFee),
      "reject" => Ok(UnknownMethodPolicy::Reject),
      other => Err(format!("unknown payment method policy '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
  /// Local currency units per unit of virtual currency.
  pub rate: Decimal,
  /// Share of the resale price the seller keeps after the marketplace cut.
  pub resale_net_share: Decimal,
  pub fees: FeeSchedule,
  pub unknown_method_policy: UnknownMethodPolicy,
}

impl Default for PricingConfig {
  fn default() -> Self {
    Self {
      rate: Decimal::new(1375, 1),
      resale_net_share: Decimal::new(7, 1),
      fees: FeeSchedule::standard(),
      unknown_method_policy: UnknownMethodPolicy::ZeroFee,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
  pub base_price: i64,
  pub admin_fee: i64,
  pub gross_amount: i64,
  /// Price the buyer must set on their resale listing.
  pub resale_price: i64,
}

#[derive(Debug, Clone)]
pub struct PricingEngine {
  config: Arc<PricingConfig>,
}

impl Default for PricingEngine {
  fn default() -> Self {
    Self::new(PricingConfig::default())
  }
}

impl PricingEngine {
  pub fn new(config: PricingConfig) -> Self {
    Self {
      config: Arc::new(config),
    }
  }

  pub fn config(&self) -> &PricingConfig {
    &self.config
  }

  /// Total over every amount; methods without a fee rule get a zero fee.
  pub fn quote(&self, amount: u32, payment_method: &str) -> PriceQuote {
    let base_price = self.base_price(amount);
    let admin_fee = self
      .config
      .fees
      .rule_for(payment_method)
      .map(|rule| rule.apply(base_price))
      .unwrap_or(0);

    PriceQuote {
      base_price,
      admin_fee,
      gross_amount: base_price + admin_fee,
      resale_price: self.resale_price(amount),
    }
  }

  pub fn base_price(&self, amount: u32) -> i64 {
    round_to_unit(Decimal::from(amount) * self.config.rate)
  }

  /// `ceil(amount / net_share)`: the listing price that nets `amount` after the marketplace cut.
  pub fn resale_price(&self, amount: u32) -> i64 {
    if self.config.resale_net_share <= Decimal::ZERO {
      return i64::from(amount);
    }
    to_units((Decimal::from(amount) / self.config.resale_net_share).ceil())
  }

  pub fn knows_method(&self, payment_method: &str) -> bool {
    self.config.fees.rule_for(payment_method).is_some()
  }
}

fn round_to_unit(value: Decimal) -> i64 {
  to_units(value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}

// Saturates; a u32 amount times any sane rate stays far inside i64.
fn to_units(value: Decimal) -> i64 {
  value.to_i64().unwrap_or(i64::MAX)
}
