// topup_core/src/lifecycle.rs

//! The order state machine as a single pure function.
//!
//! ```text
//!   PENDING_PAYMENT ──paid──▶ AWAITING_FULFILLMENT ──fulfill──▶ FULFILLED
//!         │                          │   ▲                          │
//!       failed                      fail  └──────── revise ─────────┤
//!         ▼                          ▼                              │
//!       FAILED ◀─────────────────────┘◀─────────── revise ──────────┘
//! ```
//!
//! [`transition`] never touches I/O. It says what the next status should be and
//! which effects follow; `OrderService` carries the effects out.

use serde::Serialize;

use crate::notifier::OrderEvent;
use crate::order::{OrderStatus, PaymentStatus};

/// A gateway notification reduced to what the state machine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSignal {
  /// capture + fraud accept, or settlement.
  Succeeded,
  /// capture + fraud challenge: not decided yet.
  Challenged,
  /// Transaction opened, payer has not paid.
  Pending,
  /// cancel, deny or expire.
  Failed,
  Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
  MarkFulfilled,
  MarkFailed,
  /// Manual correction: pull a terminal order back to AWAITING_FULFILLMENT.
  Revise,
}

impl OperatorAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      OperatorAction::MarkFulfilled => "fulfill",
      OperatorAction::MarkFailed => "fail",
      OperatorAction::Revise => "revise",
    }
  }
}

impl std::str::FromStr for OperatorAction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "fulfill" => Ok(OperatorAction::MarkFulfilled),
      "fail" => Ok(OperatorAction::MarkFailed),
      "revise" => Ok(OperatorAction::Revise),
      other => Err(format!("unknown operator action '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Payment(PaymentSignal),
  Operator(OperatorAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
  Persist {
    status: OrderStatus,
    payment_status: Option<PaymentStatus>,
  },
  Notify(OrderEvent),
}

/// Why a trigger left the order as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unchanged {
  /// Already in the target status (e.g. a redelivered settlement).
  AlreadyApplied,
  /// Fraud screening has not decided.
  AwaitingFraudReview,
  /// Still waiting for the payer.
  AwaitingPayment,
  UnrecognizedStatus,
  /// A gateway outcome arriving after the order moved on. Only operators may
  /// move an order out of a terminal status.
  OutOfOrder { current: OrderStatus },
  /// Operator action not defined from the current status.
  NotAllowed { current: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
  Changed {
    from: OrderStatus,
    to: OrderStatus,
    effects: Vec<Effect>,
  },
  Unchanged(Unchanged),
}

impl Transition {
  fn changed(from: OrderStatus, to: OrderStatus, payment_status: Option<PaymentStatus>, event: Option<OrderEvent>) -> Self {
    let mut effects = vec![Effect::Persist {
      status: to,
      payment_status,
    }];
    effects.extend(event.map(Effect::Notify));
    Transition::Changed { from, to, effects }
  }

  pub fn target(&self) -> Option<OrderStatus> {
    match self {
      Transition::Changed { to, .. } => Some(*to),
      Transition::Unchanged(_) => None,
    }
  }
}

pub fn transition(current: OrderStatus, trigger: Trigger) -> Transition {
  use OrderStatus::*;

  match trigger {
    Trigger::Payment(signal) => match (signal, current) {
      (PaymentSignal::Succeeded, PendingPayment) => Transition::changed(
        current,
        AwaitingFulfillment,
        Some(PaymentStatus::Paid),
        Some(OrderEvent::PaymentSuccess),
      ),
      (PaymentSignal::Succeeded, AwaitingFulfillment) => Transition::Unchanged(Unchanged::AlreadyApplied),
      (PaymentSignal::Failed, PendingPayment) => {
        Transition::changed(current, Failed, Some(PaymentStatus::Failed), Some(OrderEvent::Failed))
      }
      (PaymentSignal::Failed, Failed) => Transition::Unchanged(Unchanged::AlreadyApplied),
      (PaymentSignal::Succeeded | PaymentSignal::Failed, _) => Transition::Unchanged(Unchanged::OutOfOrder { current }),
      (PaymentSignal::Challenged, _) => Transition::Unchanged(Unchanged::AwaitingFraudReview),
      (PaymentSignal::Pending, _) => Transition::Unchanged(Unchanged::AwaitingPayment),
      (PaymentSignal::Unrecognized, _) => Transition::Unchanged(Unchanged::UnrecognizedStatus),
    },
    Trigger::Operator(action) => match (action, current) {
      (OperatorAction::MarkFulfilled, AwaitingFulfillment) => Transition::changed(current, Fulfilled, None, None),
      (OperatorAction::MarkFulfilled, Fulfilled) => Transition::Unchanged(Unchanged::AlreadyApplied),
      (OperatorAction::MarkFailed, AwaitingFulfillment) => Transition::changed(current, Failed, None, None),
      (OperatorAction::MarkFailed, Failed) => Transition::Unchanged(Unchanged::AlreadyApplied),
      (OperatorAction::Revise, Fulfilled | Failed) => Transition::changed(current, AwaitingFulfillment, None, None),
      (OperatorAction::Revise, AwaitingFulfillment) => Transition::Unchanged(Unchanged::AlreadyApplied),
      (_, _) => Transition::Unchanged(Unchanged::NotAllowed { current }),
    },
  }
}
